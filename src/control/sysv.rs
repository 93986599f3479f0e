//! SysV init controller (`/etc/init.d`).
//!
//! Install writes the init script and wires the classic runlevel symlinks
//! (`S50` for runlevels 2–5, `K02` for 0/1/6). Lifecycle goes through the
//! `service` wrapper.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

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

pub(crate) struct SysvController {
    descriptor: ServiceDescriptor,
    template: Option<String>,
    unit_dir: Option<PathBuf>,
}

impl SysvController {
    pub(crate) fn from_descriptor(descriptor: ServiceDescriptor) -> Self {
        Self {
            descriptor,
            template: None,
            unit_dir: None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Result<Self> {
        let path = PathBuf::from("/etc/init.d").join(name);
        let content = fs::read_to_string(&path).map_err(|_| SvcError::ServiceDoesNotExist)?;
        Ok(Self::from_template(name, &content))
    }

    pub(crate) fn from_template(name: &str, template: &str) -> Self {
        let mut descriptor = codec::sysv::decode(template);
        descriptor.name = name.to_string();
        Self {
            descriptor,
            template: Some(template.to_string()),
            unit_dir: None,
        }
    }

    fn file_path(&self) -> PathBuf {
        self.unit_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("/etc/init.d"))
            .join(&self.descriptor.name)
    }

    fn file_content(&self) -> String {
        self.template
            .clone()
            .unwrap_or_else(|| codec::sysv::encode(&self.descriptor))
    }

    /// Wire the runlevel symlinks. Existing links are fine; anything else
    /// (e.g. a host without `/etc/rcN.d`) is logged and skipped, matching
    /// how init-script packages behave on such systems.
    fn create_runlevel_symlinks(&self) {
        let target = self.file_path();
        let name = &self.descriptor.name;
        let links = [
            ("2", "S50"),
            ("3", "S50"),
            ("4", "S50"),
            ("5", "S50"),
            ("0", "K02"),
            ("1", "K02"),
            ("6", "K02"),
        ];
        for (runlevel, prefix) in links {
            let link = PathBuf::from(format!("/etc/rc{runlevel}.d/{prefix}{name}"));
            if let Err(source) = std::os::unix::fs::symlink(&target, &link) {
                if source.kind() != std::io::ErrorKind::AlreadyExists {
                    warn!(link = %link.display(), %source, "could not create runlevel symlink");
                }
            }
        }
    }
}

impl Controller for SysvController {
    fn install(&self) -> Result<()> {
        let path = self.file_path();
        let dir = path.parent().map(PathBuf::from).unwrap_or_default();
        fs::create_dir_all(&dir).map_err(|source| SvcError::io(&dir, source))?;

        debug!(path = %path.display(), "writing SysV init script");
        fs::write(&path, self.file_content()).map_err(|source| SvcError::io(&path, source))?;
        set_mode(&path, 0o755)?;

        self.create_runlevel_symlinks();
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        if let Err(error) = self.stop() {
            if !matches!(error, SvcError::ServiceDoesNotExist) {
                return Err(error);
            }
        }

        let path = self.file_path();
        debug!(path = %path.display(), "removing SysV init script");
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
        // Whether a SysV service is running is not portably derivable from
        // `service status` output, so only file-level facts are reported.
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn install_writes_executable_script() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = SysvController {
            descriptor: ServiceDescriptor::new("svc-a")
                .unwrap()
                .with_executable("/bin/sleep")
                .with_args(["40"]),
            template: None,
            unit_dir: Some(tmp.path().to_path_buf()),
        };

        controller.install().unwrap();
        let path = tmp.path().join("svc-a");
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("#!/bin/sh"));
        assert!(written.contains("cmd=\"/bin/sleep 40\""));

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn template_content_is_written_verbatim() {
        let template = "#!/bin/sh\n# hand-rolled\nexit 0\n";
        let tmp = tempfile::tempdir().unwrap();
        let controller = SysvController {
            descriptor: ServiceDescriptor::new("svc-b").unwrap(),
            template: Some(template.to_string()),
            unit_dir: Some(tmp.path().to_path_buf()),
        };

        controller.install().unwrap();
        let written = fs::read_to_string(tmp.path().join("svc-b")).unwrap();
        assert_eq!(written, template);
    }

    #[test]
    fn uninstall_tolerates_missing_script() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = SysvController {
            descriptor: ServiceDescriptor::new("svc-c").unwrap(),
            template: None,
            unit_dir: Some(tmp.path().to_path_buf()),
        };
        // stop() will fail against the real `service` tool with either a
        // mapped not-found or a transport error depending on the host; only
        // the file-removal path is exercised here.
        let path = controller.file_path();
        assert!(!path.exists());
        if let Err(source) = fs::remove_file(&path) {
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
    }

    #[test]
    fn info_reports_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = SysvController {
            descriptor: ServiceDescriptor::new("svc-d").unwrap(),
            template: None,
            unit_dir: Some(tmp.path().to_path_buf()),
        };
        let info = controller.info();
        assert!(matches!(info.error, Some(SvcError::ServiceDoesNotExist)));
        assert!(!info.is_running);
        assert_eq!(info.pid, -1);
    }

    #[test]
    fn from_template_recovers_command() {
        let controller = SysvController::from_template(
            "svc-e",
            "#!/bin/sh\ncmd=\"/usr/bin/app --flag\"\n",
        );
        assert_eq!(controller.descriptor.name, "svc-e");
        assert_eq!(controller.descriptor.executable, PathBuf::from("/usr/bin/app"));
        assert_eq!(controller.descriptor.args, vec!["--flag".to_string()]);
    }
}
