//! systemd controller (Linux).
//!
//! Unit files go to `/etc/systemd/system` (root) or
//! `~/.config/systemd/user` (user scope, in which case every `systemctl`
//! call gets `--user`). Decoding also searches `/usr/lib/systemd/system`
//! where distribution packages install their units.

use std::fs;
use std::path::PathBuf;

use regex::Regex;
use tracing::debug;

use crate::codec;
use crate::control::exec::{ToolOutput, run_tool, tool_failure};
use crate::control::{Controller, MappedOutcome, find_mapping, poll_until_stopped};
use crate::core::descriptor::{ServiceDescriptor, ServiceInfo};
use crate::core::errors::{Result, SvcError};
use crate::platform;

const ENABLE_MAP: &[(&[&str], MappedOutcome)] = &[(
    &["Failed to enable", "does not exist"],
    MappedOutcome::DoesNotExist,
)];

const START_MAP: &[(&[&str], MappedOutcome)] = &[(
    &["Failed to start", "not found"],
    MappedOutcome::DoesNotExist,
)];

const STOP_MAP: &[(&[&str], MappedOutcome)] = &[(
    &["Failed to stop", "not loaded"],
    MappedOutcome::DoesNotExist,
)];

const DISABLE_MAP: &[(&[&str], MappedOutcome)] = &[
    (
        &["Failed to disable", "does not exist"],
        MappedOutcome::DoesNotExist,
    ),
    (&["Removed"], MappedOutcome::Success),
];

pub(crate) struct SystemdController {
    descriptor: ServiceDescriptor,
    template: Option<String>,
    unit_dir: Option<PathBuf>,
}

impl SystemdController {
    pub(crate) fn from_descriptor(descriptor: ServiceDescriptor) -> Self {
        Self {
            descriptor,
            template: None,
            unit_dir: None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Result<Self> {
        for dir in search_dirs() {
            let path = dir.join(format!("{name}.service"));
            if let Ok(content) = fs::read_to_string(&path) {
                return Ok(Self::from_template(name, &content));
            }
        }
        Err(SvcError::ServiceDoesNotExist)
    }

    pub(crate) fn from_template(name: &str, template: &str) -> Self {
        let mut descriptor = codec::systemd::decode(template);
        descriptor.name = name.to_string();
        Self {
            descriptor,
            template: Some(template.to_string()),
            unit_dir: None,
        }
    }

    fn unit_name(&self) -> String {
        format!("{}.service", self.descriptor.name)
    }

    fn file_path(&self) -> PathBuf {
        self.unit_dir
            .clone()
            .unwrap_or_else(install_dir)
            .join(self.unit_name())
    }

    fn file_content(&self) -> String {
        self.template
            .clone()
            .unwrap_or_else(|| codec::systemd::encode(&self.descriptor))
    }

    fn systemctl(&self, args: &[&str]) -> Result<ToolOutput> {
        let mut full: Vec<&str> = Vec::with_capacity(args.len() + 1);
        if !platform::is_root() {
            full.push("--user");
        }
        full.extend_from_slice(args);
        run_tool("systemctl", &full)
    }

    /// Run systemctl and translate failures through the given substring map;
    /// unmapped failures surface as transport errors.
    fn systemctl_mapped(&self, args: &[&str], map: &[(&[&str], MappedOutcome)]) -> Result<()> {
        let output = self.systemctl(args)?;
        let combined = output.combined();
        if let Some(outcome) = find_mapping(&combined, map) {
            return outcome.into_result(&combined);
        }
        if output.success {
            Ok(())
        } else {
            Err(tool_failure("systemctl", args, &output))
        }
    }
}

impl Controller for SystemdController {
    fn install(&self) -> Result<()> {
        let path = self.file_path();
        let dir = path.parent().map(PathBuf::from).unwrap_or_default();
        fs::create_dir_all(&dir).map_err(|source| SvcError::io(&dir, source))?;

        debug!(path = %path.display(), "writing systemd unit");
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
        debug!(path = %path.display(), "removing systemd unit");
        if let Err(source) = fs::remove_file(&path) {
            if source.kind() != std::io::ErrorKind::NotFound {
                return Err(SvcError::io(&path, source));
            }
        }
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let unit = self.unit_name();
        self.systemctl_mapped(&["daemon-reload"], &[])?;
        self.systemctl_mapped(&["enable", &unit], ENABLE_MAP)?;
        self.systemctl_mapped(&["start", &unit], START_MAP)?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let unit = self.unit_name();
        self.systemctl_mapped(&["daemon-reload"], &[])?;
        self.systemctl_mapped(&["stop", &unit], STOP_MAP)?;
        self.systemctl_mapped(&["disable", &unit], DISABLE_MAP)?;
        self.systemctl_mapped(&["daemon-reload"], &[])?;
        self.systemctl_mapped(&["reset-failed"], &[])?;

        if poll_until_stopped(|| self.info()) {
            Ok(())
        } else {
            Err(SvcError::Tool {
                tool: "systemctl",
                details: "service still running after stop attempts".to_string(),
            })
        }
    }

    fn info(&self) -> ServiceInfo {
        let mut info = ServiceInfo::new(self.descriptor.clone());
        info.file_path = self.file_path();

        let mut candidates = vec![self.file_path()];
        candidates.extend(search_dirs().into_iter().map(|dir| dir.join(self.unit_name())));
        for path in candidates {
            if let Ok(content) = fs::read_to_string(&path) {
                info.file_path = path;
                info.file_content = content;
                break;
            }
        }

        // `systemctl status` exits non-zero for inactive units, so the
        // output is inspected regardless of exit status.
        let output = match self.systemctl(&["status", &self.unit_name()]) {
            Ok(output) => output,
            Err(error) => {
                info.error = Some(error);
                return info;
            }
        };
        let combined = output.combined();
        if combined.contains("could not be found") {
            info.error = Some(SvcError::ServiceDoesNotExist);
            return info;
        }

        let (pid, is_running) = parse_status(&combined);
        info.pid = pid;
        info.is_running = is_running;
        info
    }
}

/// Pull `Main PID:` and the active state out of `systemctl status` output.
fn parse_status(output: &str) -> (i32, bool) {
    let pid_pattern = Regex::new(r"Main PID:\s*(\d+)").expect("static regex");
    let pid = pid_pattern
        .captures(output)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
        .unwrap_or(-1);
    let is_running = output.contains("active (running)");
    (pid, is_running)
}

fn install_dir() -> PathBuf {
    if platform::is_root() {
        PathBuf::from("/etc/systemd/system")
    } else {
        platform::home_dir().join(".config/systemd/user")
    }
}

fn search_dirs() -> Vec<PathBuf> {
    if platform::is_root() {
        vec![
            PathBuf::from("/etc/systemd/system"),
            PathBuf::from("/usr/lib/systemd/system"),
        ]
    } else {
        vec![platform::home_dir().join(".config/systemd/user")]
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
    fn status_parsing_extracts_pid_and_state() {
        let output = "\u{25cf} svc-a.service - sample\n\
                      Active: active (running) since Mon 2026-07-06 10:00:00 UTC\n\
                      Main PID: 4242 (svc-a)\n";
        assert_eq!(parse_status(output), (4242, true));
    }

    #[test]
    fn status_parsing_inactive_service() {
        let output = "\u{25cf} svc-a.service - sample\n\
                      Active: inactive (dead)\n";
        assert_eq!(parse_status(output), (-1, false));
    }

    #[test]
    fn status_parsing_failed_service_keeps_pid_sentinel() {
        let output = "Active: failed (Result: exit-code)\nMain PID: 99 (code=exited)\n";
        let (pid, is_running) = parse_status(output);
        assert_eq!(pid, 99);
        assert!(!is_running);
    }

    #[test]
    fn template_content_is_written_verbatim() {
        let template = "[Unit]\nDescription=from template\n[Service]\nExecStart=/bin/true\n";
        let tmp = tempfile::tempdir().unwrap();
        let controller = SystemdController {
            descriptor: ServiceDescriptor::new("svc-b").unwrap(),
            template: Some(template.to_string()),
            unit_dir: Some(tmp.path().to_path_buf()),
        };

        controller.install().unwrap();
        let written = fs::read_to_string(tmp.path().join("svc-b.service")).unwrap();
        assert_eq!(written, template);
    }

    #[test]
    fn descriptor_install_writes_encoded_unit() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = SystemdController {
            descriptor: ServiceDescriptor::new("svc-c")
                .unwrap()
                .with_executable("/bin/sleep")
                .with_args(["40"]),
            template: None,
            unit_dir: Some(tmp.path().to_path_buf()),
        };

        controller.install().unwrap();
        let written = fs::read_to_string(tmp.path().join("svc-c.service")).unwrap();
        assert!(written.contains("[Service]"));
        assert!(written.contains("ExecStart=/bin/sleep 40"));
    }

    #[test]
    fn install_then_info_sees_file_content() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = SystemdController {
            descriptor: ServiceDescriptor::new("svc-e")
                .unwrap()
                .with_executable("/bin/sleep")
                .with_args(["40"]),
            template: None,
            unit_dir: Some(tmp.path().to_path_buf()),
        };

        controller.install().unwrap();
        let info = controller.info();
        assert!(!info.file_content.is_empty());
        assert!(info.file_content.contains("ExecStart=/bin/sleep 40"));
        assert_eq!(info.file_path, tmp.path().join("svc-e.service"));
    }

    #[test]
    fn from_template_decodes_and_names() {
        let controller = SystemdController::from_template(
            "svc-d",
            "[Service]\nExecStart=/bin/echo hi\nRestart=always\nRestartSec=5\n",
        );
        assert_eq!(controller.descriptor.name, "svc-d");
        assert_eq!(controller.descriptor.executable, PathBuf::from("/bin/echo"));
        assert!(controller.descriptor.start.restart);
        assert_eq!(controller.descriptor.start.restart_timeout_s, 5);
    }
}
