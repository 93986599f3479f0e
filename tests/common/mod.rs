//! Shared test fixtures for svckit integration tests.

// Not every test binary uses every item; suppress dead-code warnings for the
// shared module.
#![allow(dead_code)]

use std::path::PathBuf;

use svckit::prelude::*;

/// The install-and-query scenario descriptor: `/bin/sleep 40` with restart
/// and silenced streams.
pub fn sleep_descriptor() -> ServiceDescriptor {
    ServiceDescriptor::new("svc-a")
        .expect("fixture name is valid")
        .with_executable("/bin/sleep")
        .with_args(["40"])
        .with_working_directory("/tmp")
        .with_start(StartPolicy {
            at_boot: false,
            restart: true,
            restart_timeout_s: 10,
        })
        .with_logging(LogPolicy {
            stdout: LogSink::Disabled,
            stderr: LogSink::Disabled,
        })
}

/// A descriptor exercising every portable field.
pub fn full_descriptor() -> ServiceDescriptor {
    let mut descriptor = ServiceDescriptor::new("svc-full")
        .expect("fixture name is valid")
        .with_executable("/usr/local/bin/svc-full")
        .with_args(["--config", "/etc/svc-full.toml"])
        .with_description("full-featured fixture service")
        .with_working_directory("/var/lib/svc-full")
        .with_start(StartPolicy {
            at_boot: true,
            restart: true,
            restart_timeout_s: 5,
        })
        .with_logging(LogPolicy {
            stdout: LogSink::Path(PathBuf::from("/var/log/svc-full.log")),
            stderr: LogSink::Path(PathBuf::from("/var/log/svc-full.err")),
        });
    descriptor.documentation = "https://example.com/svc-full".to_string();
    descriptor.depends_on = vec![AbstractService::Network];
    descriptor
        .environment
        .insert("SVC_FULL_MODE".to_string(), "production".to_string());
    descriptor.credentials = Credentials {
        user: "svc".to_string(),
        group: "svc".to_string(),
    };
    descriptor
}
