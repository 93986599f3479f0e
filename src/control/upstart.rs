//! Upstart controller (`/etc/init/*.conf`, driven by `initctl`).

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

pub(crate) struct UpstartController {
    descriptor: ServiceDescriptor,
    template: Option<String>,
    unit_dir: Option<PathBuf>,
}

impl UpstartController {
    pub(crate) fn from_descriptor(descriptor: ServiceDescriptor) -> Self {
        Self {
            descriptor,
            template: None,
            unit_dir: None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Result<Self> {
        let path = PathBuf::from("/etc/init").join(format!("{name}.conf"));
        let content = fs::read_to_string(&path).map_err(|_| SvcError::ServiceDoesNotExist)?;
        Ok(Self::from_template(name, &content))
    }

    pub(crate) fn from_template(name: &str, template: &str) -> Self {
        let mut descriptor = codec::upstart::decode(template);
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
            .unwrap_or_else(|| PathBuf::from("/etc/init"))
            .join(format!("{}.conf", self.descriptor.name))
    }

    fn file_content(&self) -> String {
        self.template
            .clone()
            .unwrap_or_else(|| codec::upstart::encode(&self.descriptor))
    }

    fn initctl(&self, action: &'static str) -> Result<()> {
        let args = [action, self.descriptor.name.as_str()];
        let output = run_tool("initctl", &args)?;
        let combined = output.combined();
        let map = if action == "start" { START_MAP } else { STOP_MAP };
        if let Some(outcome) = find_mapping(&combined, map) {
            return outcome.into_result(&combined);
        }
        if output.success {
            Ok(())
        } else {
            Err(tool_failure("initctl", &args, &output))
        }
    }
}

impl Controller for UpstartController {
    fn install(&self) -> Result<()> {
        let path = self.file_path();
        let dir = path.parent().map(PathBuf::from).unwrap_or_default();
        fs::create_dir_all(&dir).map_err(|source| SvcError::io(&dir, source))?;

        debug!(path = %path.display(), "writing upstart job");
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
        debug!(path = %path.display(), "removing upstart job");
        if let Err(source) = fs::remove_file(&path) {
            if source.kind() != std::io::ErrorKind::NotFound {
                return Err(SvcError::io(&path, source));
            }
        }
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.initctl("start")
    }

    fn stop(&self) -> Result<()> {
        self.initctl("stop")
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
