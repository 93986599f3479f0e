//! Windows Service Control Manager controller.
//!
//! Unlike the Unix frameworks there is no unit file; the descriptor's fields
//! are handed to the SCM API directly (via the `windows-service` crate).
//! Errors are classified by Win32 code where available, with the historical
//! message substrings as a fallback.

use std::ffi::{OsStr, OsString};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use windows_service::service::{
    Service, ServiceAccess, ServiceErrorControl, ServiceInfo as ScmServiceInfo, ServiceStartType,
    ServiceState, ServiceType,
};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

use crate::control::exec::run_tool;
use crate::control::{Controller, poll_until_stopped};
use crate::core::descriptor::{ServiceDescriptor, ServiceInfo};
use crate::core::errors::{Result, SvcError};

/// How long to wait for one SCM state transition.
const TRANSITION_TIMEOUT: Duration = Duration::from_secs(10);
/// Poll cadence while waiting for a state transition.
const TRANSITION_POLL: Duration = Duration::from_millis(300);

const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const ERROR_SERVICE_ALREADY_RUNNING: i32 = 1056;
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;

pub(crate) struct WindowsController {
    descriptor: ServiceDescriptor,
}

impl WindowsController {
    pub(crate) fn from_descriptor(descriptor: ServiceDescriptor) -> Self {
        Self { descriptor }
    }

    fn manager(&self) -> Result<ServiceManager> {
        ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)
            .map_err(scm_error)
    }

    fn open(&self, access: ServiceAccess) -> Result<Service> {
        let manager = self.manager()?;
        manager
            .open_service(&self.descriptor.name, access)
            .map_err(|error| {
                if is_not_found(&error) {
                    SvcError::ServiceDoesNotExist
                } else {
                    scm_error(error)
                }
            })
    }

    /// Wait for the service to reach `target`, polling every 300 ms.
    fn wait_for_state(&self, service: &Service, target: ServiceState) -> Result<()> {
        let deadline = Instant::now() + TRANSITION_TIMEOUT;
        loop {
            let status = service.query_status().map_err(scm_error)?;
            if status.current_state == target {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SvcError::Scm {
                    details: format!("timeout waiting for service to reach state {target:?}"),
                });
            }
            std::thread::sleep(TRANSITION_POLL);
        }
    }
}

impl Controller for WindowsController {
    fn install(&self) -> Result<()> {
        let manager = ServiceManager::local_computer(
            None::<&str>,
            ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
        )
        .map_err(scm_error)?;

        // Idempotent: an already-registered service is a successful install.
        match manager.open_service(&self.descriptor.name, ServiceAccess::QUERY_STATUS) {
            Ok(_) => {
                debug!(name = %self.descriptor.name, "service already installed");
                return Ok(());
            }
            Err(error) if is_not_found(&error) => {}
            Err(error) => return Err(scm_error(error)),
        }

        let start_type = if self.descriptor.start.at_boot {
            ServiceStartType::AutoStart
        } else {
            ServiceStartType::OnDemand
        };
        let launch_arguments: Vec<OsString> = self
            .descriptor
            .args
            .iter()
            .map(OsString::from)
            .collect();
        let scm_info = ScmServiceInfo {
            name: OsString::from(&self.descriptor.name),
            display_name: OsString::from(&self.descriptor.name),
            service_type: ServiceType::OWN_PROCESS,
            start_type,
            error_control: ServiceErrorControl::Normal,
            executable_path: self.descriptor.executable.clone(),
            launch_arguments,
            dependencies: vec![],
            account_name: None,
            account_password: None,
        };

        debug!(name = %self.descriptor.name, "creating SCM service");
        let service = manager
            .create_service(&scm_info, ServiceAccess::CHANGE_CONFIG)
            .map_err(scm_error)?;
        if !self.descriptor.description.is_empty() {
            service
                .set_description(&self.descriptor.description)
                .map_err(scm_error)?;
        }
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        let service = match self.open(ServiceAccess::DELETE) {
            Ok(service) => service,
            Err(SvcError::ServiceDoesNotExist) => return Ok(()),
            Err(error) => return Err(error),
        };
        service.delete().map_err(scm_error)
    }

    fn start(&self) -> Result<()> {
        let service = self.open(ServiceAccess::START)?;
        match service.start::<&OsStr>(&[]) {
            Ok(()) => Ok(()),
            Err(error) if is_already_running(&error) => Ok(()),
            Err(error) => Err(scm_error(error)),
        }
    }

    fn stop(&self) -> Result<()> {
        // The stop delegate runs before the control is sent so the service
        // process can wind down its own work first.
        if let Some(on_stop) = &self.descriptor.on_stop {
            debug!(name = %self.descriptor.name, "invoking stop delegate");
            on_stop.invoke();
        }

        let service = self.open(ServiceAccess::STOP | ServiceAccess::QUERY_STATUS)?;
        match service.stop() {
            Ok(_) => self.wait_for_state(&service, ServiceState::Stopped)?,
            Err(error) if is_not_found(&error) => return Err(SvcError::ServiceDoesNotExist),
            Err(error) if treat_as_stopped(&error) => {
                debug!(name = %self.descriptor.name, "service already stopped");
            }
            Err(error) => return Err(scm_error(error)),
        }

        if poll_until_stopped(|| self.info()) {
            Ok(())
        } else {
            Err(SvcError::Scm {
                details: "could not stop system service after multiple attempts".to_string(),
            })
        }
    }

    fn info(&self) -> ServiceInfo {
        let mut info = ServiceInfo::new(self.descriptor.clone());

        let service = match self.open(ServiceAccess::QUERY_STATUS) {
            Ok(service) => service,
            Err(error) => {
                info.error = Some(error);
                return info;
            }
        };
        match service.query_status() {
            Ok(status) => {
                info.is_running = status.current_state == ServiceState::Running;
                info.pid = if info.is_running {
                    status.process_id.map_or(-1, |pid| {
                        i32::try_from(pid).unwrap_or(-1)
                    })
                } else {
                    -1
                };
            }
            Err(error) => {
                warn!(%error, "could not query service status");
                info.error = Some(scm_error(error));
            }
        }
        info
    }
}

/// Read one WMI property of a service: `wmic service '<name>' get <Property>`
/// prints a header line followed by the value.
pub(crate) fn wmic_property(name: &str, property: &str) -> Result<String> {
    let service_arg = format!("'{name}'");
    let output = run_tool("wmic", &["service", &service_arg, "get", property])?;
    Ok(output
        .stdout
        .lines()
        .nth(1)
        .map(str::trim)
        .unwrap_or_default()
        .to_string())
}

fn scm_error(error: windows_service::Error) -> SvcError {
    SvcError::Scm {
        details: error.to_string(),
    }
}

fn raw_code(error: &windows_service::Error) -> Option<i32> {
    match error {
        windows_service::Error::Winapi(io) => io.raw_os_error(),
        _ => None,
    }
}

fn is_not_found(error: &windows_service::Error) -> bool {
    raw_code(error) == Some(ERROR_SERVICE_DOES_NOT_EXIST)
        || error.to_string().contains("service does not exist")
}

fn is_already_running(error: &windows_service::Error) -> bool {
    raw_code(error) == Some(ERROR_SERVICE_ALREADY_RUNNING)
        || error.to_string().contains("already running")
}

/// "Not started" and a broken SCM pipe both mean there is nothing to stop.
fn treat_as_stopped(error: &windows_service::Error) -> bool {
    if raw_code(error) == Some(ERROR_SERVICE_NOT_ACTIVE) {
        return true;
    }
    let message = error.to_string();
    message.contains("service has not been started") || message.contains("the pipe has been ended")
}
