//! Framework-agnostic service façade.
//!
//! A [`Service`] owns one per-framework controller, chosen at construction
//! from the compile-time OS and (on Linux) the detected init framework, and
//! forwards the lifecycle operations to it.

use crate::control::Controller;
use crate::core::descriptor::{ServiceDescriptor, ServiceInfo};
use crate::core::errors::{Result, SvcError};

#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "freebsd"))
))]
use crate::core::tags::InitKind;

/// A system service bound to the host's init framework.
pub struct Service {
    controller: Box<dyn Controller>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").finish_non_exhaustive()
    }
}

impl Service {
    /// Build a service from a portable descriptor, bound to the detected
    /// framework. Fails with `UnsupportedRequest` when the host's framework
    /// has no controller.
    pub fn from_descriptor(descriptor: ServiceDescriptor) -> Result<Self> {
        if descriptor.name.is_empty() {
            return Err(SvcError::InvalidDescriptor {
                details: "name must not be empty".to_string(),
            });
        }
        Ok(Self {
            controller: controller_from_descriptor(descriptor)?,
        })
    }

    /// Reconstruct a service from a native definition already on the host.
    ///
    /// Searches the framework's unit-file locations (or queries the SCM on
    /// Windows) and decodes what it finds; the found text is retained and
    /// written back verbatim by a later `install`.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self {
            controller: controller_from_name(name)?,
        })
    }

    /// Like [`Service::from_name`], but with caller-supplied unit text
    /// instead of an on-disk file. Unsupported on Windows, which has no
    /// textual service format.
    pub fn from_platform_template(name: &str, template: &str) -> Result<Self> {
        Ok(Self {
            controller: controller_from_template(name, template)?,
        })
    }

    /// Write (or register) the service definition with the framework.
    pub fn install(&self) -> Result<()> {
        self.controller.install()
    }

    /// Remove the service definition; a missing service is not an error.
    pub fn uninstall(&self) -> Result<()> {
        self.controller.uninstall()
    }

    /// Start the service.
    pub fn start(&self) -> Result<()> {
        self.controller.start()
    }

    /// Stop the service, polling until it leaves the running state.
    pub fn stop(&self) -> Result<()> {
        self.controller.stop()
    }

    /// Query the framework for the service's current state.
    #[must_use]
    pub fn info(&self) -> ServiceInfo {
        self.controller.info()
    }
}

// ---------------------------------------------------------------------------
// Per-platform controller selection
// ---------------------------------------------------------------------------

#[cfg(target_os = "macos")]
fn controller_from_descriptor(descriptor: ServiceDescriptor) -> Result<Box<dyn Controller>> {
    Ok(Box::new(
        crate::control::launchd::LaunchdController::from_descriptor(descriptor),
    ))
}

#[cfg(target_os = "macos")]
fn controller_from_name(name: &str) -> Result<Box<dyn Controller>> {
    Ok(Box::new(crate::control::launchd::LaunchdController::from_name(name)?))
}

#[cfg(target_os = "macos")]
fn controller_from_template(name: &str, template: &str) -> Result<Box<dyn Controller>> {
    Ok(Box::new(
        crate::control::launchd::LaunchdController::from_template(name, template),
    ))
}

#[cfg(target_os = "freebsd")]
fn controller_from_descriptor(descriptor: ServiceDescriptor) -> Result<Box<dyn Controller>> {
    Ok(Box::new(crate::control::rcd::RcdController::from_descriptor(
        descriptor,
    )))
}

#[cfg(target_os = "freebsd")]
fn controller_from_name(name: &str) -> Result<Box<dyn Controller>> {
    Ok(Box::new(crate::control::rcd::RcdController::from_name(name)?))
}

#[cfg(target_os = "freebsd")]
fn controller_from_template(name: &str, template: &str) -> Result<Box<dyn Controller>> {
    Ok(Box::new(crate::control::rcd::RcdController::from_template(
        name, template,
    )))
}

#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "freebsd"))
))]
fn controller_from_descriptor(descriptor: ServiceDescriptor) -> Result<Box<dyn Controller>> {
    match crate::detect::detected_init() {
        InitKind::Systemd => Ok(Box::new(
            crate::control::systemd::SystemdController::from_descriptor(descriptor),
        )),
        InitKind::Upstart => Ok(Box::new(
            crate::control::upstart::UpstartController::from_descriptor(descriptor),
        )),
        // Unknown falls back to SysV: the least-capable framework whose
        // on-disk format any init can still run.
        InitKind::SystemV | InitKind::Unknown => Ok(Box::new(
            crate::control::sysv::SysvController::from_descriptor(descriptor),
        )),
        other => Err(unsupported_init(other)),
    }
}

#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "freebsd"))
))]
fn controller_from_name(name: &str) -> Result<Box<dyn Controller>> {
    match crate::detect::detected_init() {
        InitKind::Systemd => Ok(Box::new(
            crate::control::systemd::SystemdController::from_name(name)?,
        )),
        InitKind::Upstart => Ok(Box::new(
            crate::control::upstart::UpstartController::from_name(name)?,
        )),
        InitKind::SystemV | InitKind::Unknown => Ok(Box::new(
            crate::control::sysv::SysvController::from_name(name)?,
        )),
        other => Err(unsupported_init(other)),
    }
}

#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "freebsd"))
))]
fn controller_from_template(name: &str, template: &str) -> Result<Box<dyn Controller>> {
    match crate::detect::detected_init() {
        InitKind::Systemd => Ok(Box::new(
            crate::control::systemd::SystemdController::from_template(name, template),
        )),
        InitKind::Upstart => Ok(Box::new(
            crate::control::upstart::UpstartController::from_template(name, template),
        )),
        InitKind::SystemV | InitKind::Unknown => Ok(Box::new(
            crate::control::sysv::SysvController::from_template(name, template),
        )),
        other => Err(unsupported_init(other)),
    }
}

#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "freebsd"))
))]
fn unsupported_init(init: InitKind) -> SvcError {
    SvcError::UnsupportedRequest {
        details: format!("no controller for init framework {init:?}"),
    }
}

#[cfg(windows)]
fn controller_from_descriptor(descriptor: ServiceDescriptor) -> Result<Box<dyn Controller>> {
    Ok(Box::new(
        crate::control::windows::WindowsController::from_descriptor(descriptor),
    ))
}

#[cfg(windows)]
fn controller_from_name(name: &str) -> Result<Box<dyn Controller>> {
    use crate::control::windows::{WindowsController, wmic_property};
    use std::path::PathBuf;

    // Existence probe first; wmic output for a missing service is useless.
    let probe = WindowsController::from_descriptor(ServiceDescriptor::new(name)?);
    let info = probe.info();
    if matches!(info.error, Some(SvcError::ServiceDoesNotExist)) {
        return Err(SvcError::ServiceDoesNotExist);
    }

    let mut descriptor = ServiceDescriptor::new(name)?;
    descriptor.description = wmic_property(name, "Description").unwrap_or_default();
    let path_name = wmic_property(name, "PathName").unwrap_or_default();
    let mut parts = path_name.split_whitespace();
    if let Some(executable) = parts.next() {
        descriptor.executable = PathBuf::from(executable);
    }
    descriptor.args = parts.map(ToString::to_string).collect();

    Ok(Box::new(WindowsController::from_descriptor(descriptor)))
}

#[cfg(windows)]
fn controller_from_template(_name: &str, _template: &str) -> Result<Box<dyn Controller>> {
    Err(SvcError::UnsupportedRequest {
        details: "Windows services have no platform template format".to_string(),
    })
}

#[cfg(not(any(unix, windows)))]
fn controller_from_descriptor(_descriptor: ServiceDescriptor) -> Result<Box<dyn Controller>> {
    Err(unsupported_platform())
}

#[cfg(not(any(unix, windows)))]
fn controller_from_name(_name: &str) -> Result<Box<dyn Controller>> {
    Err(unsupported_platform())
}

#[cfg(not(any(unix, windows)))]
fn controller_from_template(_name: &str, _template: &str) -> Result<Box<dyn Controller>> {
    Err(unsupported_platform())
}

#[cfg(not(any(unix, windows)))]
fn unsupported_platform() -> SvcError {
    SvcError::UnsupportedRequest {
        details: "no service framework controller for this platform".to_string(),
    }
}
