//! The portable service descriptor: the framework-neutral record callers
//! supply, and the info record lifecycle queries return.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SvcError};
use crate::core::tags::{AbstractService, InitKind, OsTag};

/// Destination for one of the service's output streams.
///
/// Three-way on purpose: "silent", "whatever the platform does by default",
/// and "this file". `Disabled` wins over `Default` wins over a path, which
/// the tagged representation makes unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSink {
    /// Discard the stream.
    #[default]
    Disabled,
    /// Let the framework pick its platform default.
    Default,
    /// Append the stream to this file.
    Path(PathBuf),
}

impl LogSink {
    /// The configured file path, if this sink is file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Path(path) => Some(path),
            Self::Disabled | Self::Default => None,
        }
    }
}

/// Stream destinations for the service process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPolicy {
    /// Where stdout goes.
    pub stdout: LogSink,
    /// Where stderr goes.
    pub stderr: LogSink,
}

/// Start-time policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPolicy {
    /// Start the service when the host boots.
    pub at_boot: bool,
    /// Restart the service when it exits.
    pub restart: bool,
    /// Seconds to wait before a restart.
    pub restart_timeout_s: u32,
}

/// Run-as identity. Empty strings mean "framework default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// User to run the service as.
    pub user: String,
    /// Group to run the service as.
    pub group: String,
}

/// Callback invoked inside the service process when a stop control arrives.
///
/// Only the Windows service runtime invokes this; on every other platform it
/// is carried but never called.
#[derive(Clone)]
pub struct StopHandler(Arc<dyn Fn() + Send + Sync + 'static>);

impl StopHandler {
    /// Wrap a callback.
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    /// Run the callback.
    pub fn invoke(&self) {
        (self.0)();
    }
}

impl fmt::Debug for StopHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StopHandler(..)")
    }
}

impl PartialEq for StopHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Portable description of a system service.
///
/// A common-denominator mix of what systemd, launchd, the BSD rc system, and
/// the Windows SCM can express. Every field except `name` is optional;
/// `executable` must be set before `install` will produce anything usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDescriptor {
    /// Unique service identifier; becomes the unit file stem or SCM name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Reference URL or text.
    pub documentation: String,
    /// Absolute path of the program to run.
    pub executable: PathBuf,
    /// Positional arguments.
    pub args: Vec<String>,
    /// Working directory for the service process.
    pub working_directory: Option<PathBuf>,
    /// Extra environment variables for the service process.
    pub environment: BTreeMap<String, String>,
    /// Abstract dependencies, mapped per framework at encode time.
    pub depends_on: Vec<AbstractService>,
    /// Wholesale replacement of `depends_on` when running on a given OS.
    pub depends_on_override_by_os: BTreeMap<OsTag, Vec<AbstractService>>,
    /// Wholesale replacement of `depends_on` under a given init framework.
    pub depends_on_override_by_init: BTreeMap<InitKind, Vec<AbstractService>>,
    /// Start-time policy.
    pub start: StartPolicy,
    /// Stream destinations.
    pub logging: LogPolicy,
    /// Run-as identity.
    pub credentials: Credentials,
    /// Stop callback for the Windows service runtime.
    #[serde(skip)]
    pub on_stop: Option<StopHandler>,
}

impl ServiceDescriptor {
    /// Create a descriptor with a validated name; all other fields default.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            ..Self::default()
        })
    }

    /// Set the executable path.
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Set the positional arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Set the start policy.
    #[must_use]
    pub fn with_start(mut self, start: StartPolicy) -> Self {
        self.start = start;
        self
    }

    /// Set the logging policy.
    #[must_use]
    pub fn with_logging(mut self, logging: LogPolicy) -> Self {
        self.logging = logging;
        self
    }

    /// The dependency set effective on the given OS/init combination.
    ///
    /// Precedence: per-OS override, then per-init override, then the base
    /// `depends_on` list. The descriptor itself is never mutated.
    #[must_use]
    pub fn resolved_depends_on(&self, os: Option<OsTag>, init: InitKind) -> &[AbstractService] {
        if let Some(os) = os
            && let Some(list) = self.depends_on_override_by_os.get(&os)
        {
            return list;
        }
        if let Some(list) = self.depends_on_override_by_init.get(&init) {
            return list;
        }
        &self.depends_on
    }
}

/// Service names become file stems and SCM identifiers, so they must be
/// plain single-component tokens.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SvcError::InvalidDescriptor {
            details: "name must not be empty".to_string(),
        });
    }
    if name.contains(['/', '\\']) {
        return Err(SvcError::InvalidDescriptor {
            details: format!("name {name:?} must not contain path separators"),
        });
    }
    if name.contains(char::is_whitespace) || name.contains('\0') {
        return Err(SvcError::InvalidDescriptor {
            details: format!("name {name:?} must not contain whitespace or NUL"),
        });
    }
    Ok(())
}

/// What `info` reports about a service.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    /// The descriptor the controller holds.
    #[serde(rename = "config")]
    pub descriptor: ServiceDescriptor,
    /// Whether the framework reports the service as running.
    #[serde(rename = "isRunning")]
    pub is_running: bool,
    /// Main process ID, `-1` when not running or unknown.
    pub pid: i32,
    /// On-disk unit file path (empty on frameworks without one).
    #[serde(rename = "filePath")]
    pub file_path: PathBuf,
    /// Raw unit file content as found on disk.
    #[serde(rename = "fileContent")]
    pub file_content: String,
    /// Error encountered while querying, if any. Descriptor and file content
    /// stay observable in partial-failure cases.
    #[serde(skip)]
    pub error: Option<SvcError>,
}

impl ServiceInfo {
    /// A "nothing known yet" record for the given descriptor.
    #[must_use]
    pub(crate) fn new(descriptor: ServiceDescriptor) -> Self {
        Self {
            descriptor,
            is_running: false,
            pid: -1,
            file_path: PathBuf::new(),
            file_content: String::new(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_bad_names() {
        assert!(ServiceDescriptor::new("").is_err());
        assert!(ServiceDescriptor::new("a/b").is_err());
        assert!(ServiceDescriptor::new("a\\b").is_err());
        assert!(ServiceDescriptor::new("a b").is_err());
        assert!(ServiceDescriptor::new("a\tb").is_err());
        assert!(ServiceDescriptor::new("svc-a").is_ok());
        assert!(ServiceDescriptor::new("svc.a_1").is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let descriptor = ServiceDescriptor::new("svc-a")
            .unwrap()
            .with_executable("/bin/sleep")
            .with_args(["40"])
            .with_description("test service")
            .with_working_directory("/tmp")
            .with_start(StartPolicy {
                at_boot: true,
                restart: true,
                restart_timeout_s: 10,
            });

        assert_eq!(descriptor.executable, PathBuf::from("/bin/sleep"));
        assert_eq!(descriptor.args, vec!["40".to_string()]);
        assert_eq!(descriptor.working_directory, Some(PathBuf::from("/tmp")));
        assert!(descriptor.start.at_boot);
        assert_eq!(descriptor.start.restart_timeout_s, 10);
    }

    #[test]
    fn dependency_override_precedence() {
        let mut descriptor = ServiceDescriptor::new("svc-a").unwrap();
        descriptor.depends_on = vec![AbstractService::Network];
        descriptor
            .depends_on_override_by_init
            .insert(InitKind::Systemd, vec![AbstractService::Bluetooth]);

        // Init override applies when the init matches.
        assert_eq!(
            descriptor.resolved_depends_on(Some(OsTag::Linux), InitKind::Systemd),
            &[AbstractService::Bluetooth]
        );
        // Base list applies otherwise.
        assert_eq!(
            descriptor.resolved_depends_on(Some(OsTag::Linux), InitKind::Upstart),
            &[AbstractService::Network]
        );

        // OS override wins over the init override.
        descriptor.depends_on_override_by_os.insert(
            OsTag::Linux,
            vec![AbstractService::Network, AbstractService::Bluetooth],
        );
        assert_eq!(
            descriptor.resolved_depends_on(Some(OsTag::Linux), InitKind::Systemd),
            &[AbstractService::Network, AbstractService::Bluetooth]
        );
    }

    #[test]
    fn log_sink_default_is_disabled() {
        assert_eq!(LogSink::default(), LogSink::Disabled);
        assert_eq!(LogSink::Path(PathBuf::from("/var/log/a.log")).path(), Some(&PathBuf::from("/var/log/a.log")));
        assert_eq!(LogSink::Disabled.path(), None);
    }

    #[test]
    fn descriptor_serializes_with_camel_case_keys() {
        let descriptor = ServiceDescriptor::new("svc-a")
            .unwrap()
            .with_executable("/bin/true")
            .with_working_directory("/tmp");
        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("\"workingDirectory\""), "json: {json}");
        assert!(json.contains("\"dependsOn\""), "json: {json}");
    }

    #[test]
    fn stop_handler_compares_by_identity() {
        let a = StopHandler::new(|| {});
        let b = a.clone();
        let c = StopHandler::new(|| {});
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn info_defaults_to_not_running() {
        let info = ServiceInfo::new(ServiceDescriptor::new("svc-a").unwrap());
        assert!(!info.is_running);
        assert_eq!(info.pid, -1);
        assert!(info.error.is_none());
    }
}
