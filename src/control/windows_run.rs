//! The service-side runtime loop for programs running *as* a Windows service.
//!
//! `run_service_loop` blocks on the SCM dispatcher: it registers a control
//! handler accepting Stop/Shutdown/Pause/Continue/Interrogate, reports
//! Running, and drains controls until a stop arrives. Interrogate echoes the
//! current status twice, 100 ms apart, to sidestep a long-standing SCM
//! deadlock (winsvc issue #4). The descriptor's `on_stop` callback runs on
//! its own thread so the handler keeps answering Interrogate while the
//! callback winds the service down.

use std::ffi::OsString;
use std::sync::OnceLock;
use std::time::Duration;

use tracing::{debug, error, warn};

use windows_service::service::{
    ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
    ServiceType,
};
use windows_service::service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle};
use windows_service::{define_windows_service, service_dispatcher};

use crate::core::descriptor::ServiceDescriptor;
use crate::core::errors::{Result, SvcError};

/// The dispatcher entry point takes a plain function, so the descriptor is
/// parked here before `service_dispatcher::start` is called.
static RUN_DESCRIPTOR: OnceLock<ServiceDescriptor> = OnceLock::new();

const ACCEPTED: ServiceControlAccept = ServiceControlAccept::STOP
    .union(ServiceControlAccept::SHUTDOWN)
    .union(ServiceControlAccept::PAUSE_CONTINUE);

/// Hand the current process over to the SCM as the given service.
///
/// Blocks until the SCM tells the service to stop. Must only be called once
/// per process, from a process the SCM actually launched.
pub fn run_service_loop(descriptor: ServiceDescriptor) -> Result<()> {
    let name = descriptor.name.clone();
    RUN_DESCRIPTOR
        .set(descriptor)
        .map_err(|_| SvcError::UnsupportedRequest {
            details: "service loop already started in this process".to_string(),
        })?;

    debug!(%name, "entering SCM dispatcher");
    service_dispatcher::start(&name, ffi_service_main).map_err(|source| SvcError::Scm {
        details: source.to_string(),
    })
}

define_windows_service!(ffi_service_main, service_main);

fn service_main(_arguments: Vec<OsString>) {
    if let Err(source) = run_control_loop() {
        error!(%source, "service control loop failed");
    }
}

fn run_control_loop() -> windows_service::Result<()> {
    let descriptor = RUN_DESCRIPTOR
        .get()
        .expect("descriptor stored before dispatch");

    let (control_sender, control_receiver) = crossbeam_channel::unbounded();
    let handler = move |control: ServiceControl| -> ServiceControlHandlerResult {
        match control {
            ServiceControl::Stop
            | ServiceControl::Shutdown
            | ServiceControl::Pause
            | ServiceControl::Continue
            | ServiceControl::Interrogate => {
                let _ = control_sender.send(control);
                ServiceControlHandlerResult::NoError
            }
            other => {
                warn!(?other, "unexpected control request");
                ServiceControlHandlerResult::NotImplemented
            }
        }
    };

    let status_handle = service_control_handler::register(&descriptor.name, handler)?;
    set_state(&status_handle, ServiceState::StartPending)?;
    set_state(&status_handle, ServiceState::Running)?;
    let mut current_state = ServiceState::Running;

    while let Ok(control) = control_receiver.recv() {
        match control {
            ServiceControl::Stop | ServiceControl::Shutdown => {
                debug!("stop control received");
                if let Some(on_stop) = descriptor.on_stop.clone() {
                    std::thread::spawn(move || on_stop.invoke());
                }
                break;
            }
            ServiceControl::Pause => {
                set_state(&status_handle, ServiceState::Paused)?;
                current_state = ServiceState::Paused;
            }
            ServiceControl::Continue => {
                set_state(&status_handle, ServiceState::Running)?;
                current_state = ServiceState::Running;
            }
            ServiceControl::Interrogate => {
                // Echo twice with a pause; a single echo can deadlock the SCM.
                set_state(&status_handle, current_state)?;
                std::thread::sleep(Duration::from_millis(100));
                set_state(&status_handle, current_state)?;
            }
            _ => {}
        }
    }

    set_state(&status_handle, ServiceState::StopPending)?;
    set_state(&status_handle, ServiceState::Stopped)?;
    Ok(())
}

fn set_state(
    handle: &ServiceStatusHandle,
    state: ServiceState,
) -> windows_service::Result<()> {
    let controls_accepted = if state == ServiceState::Stopped {
        ServiceControlAccept::empty()
    } else {
        ACCEPTED
    };
    handle.set_service_status(ServiceStatus {
        service_type: ServiceType::OWN_PROCESS,
        current_state: state,
        controls_accepted,
        exit_code: ServiceExitCode::Win32(0),
        checkpoint: 0,
        wait_hint: Duration::default(),
        process_id: None,
    })
}
