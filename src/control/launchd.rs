//! launchd controller (macOS).
//!
//! Root installs land in `/Library/LaunchDaemons`, user installs in
//! `~/Library/LaunchAgents`. Lifecycle goes through `launchctl`; the
//! substring table below maps its stderr phrases onto the portable taxonomy.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::codec;
use crate::control::exec::run_tool;
use crate::control::{Controller, MappedOutcome, find_mapping, poll_until_stopped};
use crate::core::descriptor::{LogSink, ServiceDescriptor, ServiceInfo};
use crate::core::errors::{Result, SvcError};
use crate::platform;

const LOAD_MAP: &[(&[&str], MappedOutcome)] = &[
    (&["No such file or directory"], MappedOutcome::DoesNotExist),
    (&["Invalid property list"], MappedOutcome::ConfigError),
    (&["service already loaded"], MappedOutcome::Success),
];

const UNLOAD_MAP: &[(&[&str], MappedOutcome)] = &[(
    &["Could not find specified service"],
    MappedOutcome::DoesNotExist,
)];

pub(crate) struct LaunchdController {
    descriptor: ServiceDescriptor,
    /// Verbatim file content for template-constructed services; `install`
    /// writes these bytes unchanged instead of re-encoding.
    template: Option<String>,
    /// Test override for the plist directory.
    unit_dir: Option<PathBuf>,
}

impl LaunchdController {
    pub(crate) fn from_descriptor(mut descriptor: ServiceDescriptor) -> Self {
        // Platform-default log sinks become concrete paths here so the codec
        // stays pure.
        let log_dir = default_log_dir(&descriptor.name);
        if descriptor.logging.stdout == LogSink::Default {
            descriptor.logging.stdout =
                LogSink::Path(log_dir.join(format!("{}.stdout.log", descriptor.name)));
        }
        if descriptor.logging.stderr == LogSink::Default {
            descriptor.logging.stderr =
                LogSink::Path(log_dir.join(format!("{}.stderr.log", descriptor.name)));
        }

        Self {
            descriptor,
            template: None,
            unit_dir: None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Result<Self> {
        let path = plist_dir().join(format!("{name}.plist"));
        let content = fs::read_to_string(&path).map_err(|_| SvcError::ServiceDoesNotExist)?;
        Ok(Self::from_template(name, &content))
    }

    pub(crate) fn from_template(name: &str, template: &str) -> Self {
        let mut descriptor = codec::launchd::decode(template);
        if descriptor.name.is_empty() {
            descriptor.name = name.to_string();
        }
        Self {
            descriptor,
            template: Some(template.to_string()),
            unit_dir: None,
        }
    }

    fn file_path(&self) -> PathBuf {
        self.unit_dir
            .clone()
            .unwrap_or_else(plist_dir)
            .join(format!("{}.plist", self.descriptor.name))
    }

    fn file_content(&self) -> String {
        self.template
            .clone()
            .unwrap_or_else(|| codec::launchd::encode(&self.descriptor))
    }
}

impl Controller for LaunchdController {
    fn install(&self) -> Result<()> {
        let path = self.file_path();
        let dir = path.parent().map(PathBuf::from).unwrap_or_default();
        fs::create_dir_all(&dir).map_err(|source| SvcError::io(&dir, source))?;

        debug!(path = %path.display(), "writing launchd plist");
        fs::write(&path, self.file_content()).map_err(|source| SvcError::io(&path, source))?;
        set_mode(&path, 0o644)?;
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        if let Err(error) = self.stop() {
            if !matches!(error, SvcError::ServiceDoesNotExist) {
                return Err(error);
            }
        }

        let path = self.file_path();
        debug!(path = %path.display(), "removing launchd plist");
        if let Err(source) = fs::remove_file(&path) {
            if source.kind() != std::io::ErrorKind::NotFound {
                return Err(SvcError::io(&path, source));
            }
        }

        // launchctl remove's behavior is barely documented; the unload and
        // file removal above already deregister the service, so the result
        // is ignored.
        if let Err(error) = run_tool("launchctl", &["remove", &self.descriptor.name]) {
            warn!(%error, "launchctl remove failed");
        }
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let path = self.file_path();
        let path_str = path.to_string_lossy();
        let output = run_tool("launchctl", &["load", "-w", &path_str])?;
        if let Some(outcome) = find_mapping(&output.combined(), LOAD_MAP) {
            // "already loaded" means there is nothing left to do.
            return outcome.into_result(&output.combined());
        }

        if let Err(error) = run_tool("launchctl", &["start", &self.descriptor.name]) {
            warn!(%error, "launchctl start failed");
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Err(error) = run_tool("launchctl", &["stop", &self.descriptor.name]) {
            warn!(%error, "launchctl stop failed");
        }

        let path = self.file_path();
        let path_str = path.to_string_lossy();
        let output = run_tool("launchctl", &["unload", &path_str])?;
        if let Some(outcome) = find_mapping(&output.combined(), UNLOAD_MAP) {
            outcome.into_result(&output.combined())?;
        }

        if poll_until_stopped(|| self.info()) {
            Ok(())
        } else {
            Err(SvcError::Tool {
                tool: "launchctl",
                details: "service still running after stop attempts".to_string(),
            })
        }
    }

    fn info(&self) -> ServiceInfo {
        let mut info = ServiceInfo::new(self.descriptor.clone());
        info.file_path = self.file_path();

        match fs::read_to_string(&info.file_path) {
            Ok(content) if !content.is_empty() => info.file_content = content,
            _ => info.error = Some(SvcError::ServiceDoesNotExist),
        }

        let output = match run_tool("launchctl", &["list"]) {
            Ok(output) => output,
            Err(error) => {
                info.error = Some(error);
                return info;
            }
        };

        let (pid, is_running) = parse_launchctl_list(&output.stdout, &self.descriptor.name);
        info.pid = pid;
        info.is_running = is_running;
        info
    }
}

/// Parse `launchctl list` output: tab-separated PID, status, label columns.
/// A `-` in the PID column means the job is loaded but not running.
fn parse_launchctl_list(output: &str, name: &str) -> (i32, bool) {
    for line in output.trim().lines() {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 3 || columns[2].trim() != name {
            continue;
        }
        let pid = columns[0].trim();
        if pid != "-"
            && let Ok(pid) = pid.parse::<i32>()
        {
            return (pid, true);
        }
        return (-1, false);
    }
    (-1, false)
}

fn plist_dir() -> PathBuf {
    if platform::is_root() {
        PathBuf::from("/Library/LaunchDaemons")
    } else {
        platform::home_dir().join("Library/LaunchAgents")
    }
}

fn default_log_dir(name: &str) -> PathBuf {
    if platform::is_root() {
        PathBuf::from("/Library/Logs").join(name)
    } else {
        platform::home_dir().join("Library/Logs").join(name)
    }
}

fn set_mode(path: &std::path::Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|source| SvcError::io(path, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_parsing_finds_running_pid() {
        let output = "1234\t0\tsvc-a\n5678\t0\tother";
        assert_eq!(parse_launchctl_list(output, "svc-a"), (1234, true));
    }

    #[test]
    fn list_parsing_dash_pid_is_not_running() {
        let output = "-\t0\tsvc-a";
        assert_eq!(parse_launchctl_list(output, "svc-a"), (-1, false));
    }

    #[test]
    fn list_parsing_missing_label_is_not_running() {
        let output = "1234\t0\tother-service";
        assert_eq!(parse_launchctl_list(output, "svc-a"), (-1, false));
    }

    #[test]
    fn list_parsing_skips_malformed_lines() {
        let output = "PID\tStatus\n garbage \n123\t0\tsvc-a";
        assert_eq!(parse_launchctl_list(output, "svc-a"), (123, true));
    }

    #[test]
    fn default_sinks_become_concrete_log_paths() {
        let mut descriptor = ServiceDescriptor::new("svc-a").unwrap();
        descriptor.logging.stdout = LogSink::Default;
        descriptor.logging.stderr = LogSink::Default;
        let controller = LaunchdController::from_descriptor(descriptor);

        let stdout = controller.descriptor.logging.stdout.path().unwrap();
        assert!(stdout.to_string_lossy().ends_with("svc-a.stdout.log"));
        let stderr = controller.descriptor.logging.stderr.path().unwrap();
        assert!(stderr.to_string_lossy().ends_with("svc-a.stderr.log"));
    }

    #[test]
    fn template_content_is_written_verbatim() {
        let template = "<?xml version=\"1.0\"?><plist><dict></dict></plist>";
        let tmp = tempfile::tempdir().unwrap();
        let controller = LaunchdController {
            descriptor: ServiceDescriptor::new("svc-b").unwrap(),
            template: Some(template.to_string()),
            unit_dir: Some(tmp.path().to_path_buf()),
        };

        controller.install().unwrap();
        let written = fs::read_to_string(tmp.path().join("svc-b.plist")).unwrap();
        assert_eq!(written, template);
    }

    #[test]
    fn descriptor_install_writes_encoded_plist() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = LaunchdController {
            descriptor: ServiceDescriptor::new("svc-c")
                .unwrap()
                .with_executable("/bin/sleep")
                .with_args(["40"]),
            template: None,
            unit_dir: Some(tmp.path().to_path_buf()),
        };

        controller.install().unwrap();
        let written = fs::read_to_string(tmp.path().join("svc-c.plist")).unwrap();
        assert!(written.contains("<key>Label</key>"));
        assert!(written.contains("<string>svc-c</string>"));
        assert!(written.contains("<string>/bin/sleep</string>"));
    }

    #[test]
    fn from_template_fills_missing_name() {
        let controller = LaunchdController::from_template("svc-d", "not a plist");
        assert_eq!(controller.descriptor.name, "svc-d");
        assert_eq!(controller.template.as_deref(), Some("not a plist"));
    }
}
