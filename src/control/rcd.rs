//! FreeBSD rc.d controller.
//!
//! Scripts live in `/etc/rc.d` (install target) or `/usr/local/etc/rc.d`
//! (ports); both are searched when decoding. Boot enablement is an
//! `/etc/rc.conf` rewrite performed at install time, separate from the
//! script body itself.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::codec;
use crate::control::exec::{run_tool, tool_failure};
use crate::control::{Controller, MappedOutcome, find_mapping};
use crate::core::descriptor::{ServiceDescriptor, ServiceInfo};
use crate::core::errors::{Result, SvcError};

const START_MAP: &[(&[&str], MappedOutcome)] = &[(
    &["Failed to start", "not found"],
    MappedOutcome::DoesNotExist,
)];

const STOP_MAP: &[(&[&str], MappedOutcome)] = &[(
    &["Failed to stop", "not loaded"],
    MappedOutcome::DoesNotExist,
)];

pub(crate) struct RcdController {
    descriptor: ServiceDescriptor,
    template: Option<String>,
    unit_dir: Option<PathBuf>,
    rc_conf: Option<PathBuf>,
}

impl RcdController {
    pub(crate) fn from_descriptor(descriptor: ServiceDescriptor) -> Self {
        Self {
            descriptor,
            template: None,
            unit_dir: None,
            rc_conf: None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Result<Self> {
        for dir in ["/etc/rc.d", "/usr/local/etc/rc.d"] {
            let path = PathBuf::from(dir).join(name);
            if let Ok(content) = fs::read_to_string(&path) {
                return Ok(Self::from_template(name, &content));
            }
        }
        Err(SvcError::ServiceDoesNotExist)
    }

    pub(crate) fn from_template(name: &str, template: &str) -> Self {
        let mut descriptor = codec::rcd::decode(template);
        descriptor.name = name.to_string();
        Self {
            descriptor,
            template: Some(template.to_string()),
            unit_dir: None,
            rc_conf: None,
        }
    }

    fn file_path(&self) -> PathBuf {
        self.unit_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("/etc/rc.d"))
            .join(&self.descriptor.name)
    }

    fn file_content(&self) -> String {
        self.template
            .clone()
            .unwrap_or_else(|| codec::rcd::encode(&self.descriptor))
    }

    fn rc_conf_path(&self) -> PathBuf {
        self.rc_conf
            .clone()
            .unwrap_or_else(|| PathBuf::from("/etc/rc.conf"))
    }

    /// Sync `/etc/rc.conf` with the descriptor's at-boot flag.
    ///
    /// Read–modify–write without locking; rc.d installs are root-serialised
    /// in practice.
    fn sync_rc_conf(&self) -> Result<()> {
        let path = self.rc_conf_path();
        let existing = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                if !self.descriptor.start.at_boot {
                    return Ok(());
                }
                String::new()
            }
            Err(source) => return Err(SvcError::io(&path, source)),
        };

        let rewritten = rewrite_rc_conf(&existing, &self.descriptor.name, self.descriptor.start.at_boot);
        if rewritten != existing {
            debug!(path = %path.display(), "updating rc.conf enablement");
            fs::write(&path, rewritten).map_err(|source| SvcError::io(&path, source))?;
        }
        Ok(())
    }
}

/// Drop any existing `<name>_enable` lines and append a fresh one when the
/// service should start at boot.
fn rewrite_rc_conf(existing: &str, name: &str, at_boot: bool) -> String {
    let enable_var = format!("{name}_enable");
    let mut lines: Vec<&str> = existing
        .lines()
        .filter(|line| !line.trim_start().starts_with(&enable_var))
        .collect();
    let enable_line = format!("{enable_var}=\"YES\"");
    if at_boot {
        lines.push(&enable_line);
    }
    let mut result = lines.join("\n");
    if !result.is_empty() {
        result.push('\n');
    }
    result
}

impl Controller for RcdController {
    fn install(&self) -> Result<()> {
        let path = self.file_path();
        let dir = path.parent().map(PathBuf::from).unwrap_or_default();
        fs::create_dir_all(&dir).map_err(|source| SvcError::io(&dir, source))?;

        debug!(path = %path.display(), "writing rc.d script");
        fs::write(&path, self.file_content()).map_err(|source| SvcError::io(&path, source))?;
        set_mode(&path, 0o755)?;

        self.sync_rc_conf()
    }

    fn uninstall(&self) -> Result<()> {
        if let Err(error) = self.stop() {
            if !matches!(error, SvcError::ServiceDoesNotExist) {
                return Err(error);
            }
        }

        let path = self.file_path();
        debug!(path = %path.display(), "removing rc.d script");
        if let Err(source) = fs::remove_file(&path) {
            if source.kind() != std::io::ErrorKind::NotFound {
                return Err(SvcError::io(&path, source));
            }
        }
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let args = [self.descriptor.name.as_str(), "start"];
        let output = run_tool("service", &args)?;
        let combined = output.combined();
        if let Some(outcome) = find_mapping(&combined, START_MAP) {
            return outcome.into_result(&combined);
        }
        if output.success {
            Ok(())
        } else {
            Err(tool_failure("service", &args, &output))
        }
    }

    fn stop(&self) -> Result<()> {
        let args = [self.descriptor.name.as_str(), "stop"];
        let output = run_tool("service", &args)?;
        let combined = output.combined();
        if let Some(outcome) = find_mapping(&combined, STOP_MAP) {
            return outcome.into_result(&combined);
        }
        if output.success {
            Ok(())
        } else {
            Err(tool_failure("service", &args, &output))
        }
    }

    fn info(&self) -> ServiceInfo {
        let mut info = ServiceInfo::new(self.descriptor.clone());
        info.file_path = self.file_path();
        match fs::read_to_string(&info.file_path) {
            Ok(content) if !content.is_empty() => info.file_content = content,
            _ => info.error = Some(SvcError::ServiceDoesNotExist),
        }
        info
    }
}

fn set_mode(path: &std::path::Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|source| SvcError::io(path, source))
}
