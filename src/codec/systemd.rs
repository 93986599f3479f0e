//! systemd unit-file codec.
//!
//! Key map (see `systemd.unit(5)` / `systemd.service(5)`):
//! `[Unit]` Description/Documentation/Requires plus the start-limit block when
//! restart is enabled; `[Service]` Type=simple, ExecStart, WorkingDirectory,
//! Environment, Restart/RestartSec, StandardOutput/StandardError, User/Group;
//! `[Install]` WantedBy=multi-user.target when the service starts at boot.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::codec::{plain_command_line, value_after};
use crate::core::descriptor::{LogSink, ServiceDescriptor};
use crate::core::tags::{self, InitKind, OsTag};

/// Render a descriptor as a systemd unit file.
#[must_use]
pub fn encode(descriptor: &ServiceDescriptor) -> String {
    let depends_on = tags::map_depends_on(
        InitKind::Systemd,
        descriptor.resolved_depends_on(OsTag::current(), InitKind::Systemd),
    );

    let mut unit = String::with_capacity(512);

    // -- [Unit] section ------------------------------------------------
    writeln!(unit, "[Unit]").ok();
    if !descriptor.description.is_empty() {
        writeln!(unit, "Description={}", descriptor.description).ok();
    }
    if !descriptor.documentation.is_empty() {
        writeln!(unit, "Documentation={}", descriptor.documentation).ok();
    }
    if !depends_on.is_empty() {
        writeln!(unit, "Requires={}", depends_on.join(" ")).ok();
    }
    if descriptor.start.restart {
        // Let the unit restart forever: burst of 0 disables rate limiting.
        writeln!(
            unit,
            "StartLimitIntervalSec={}",
            descriptor.start.restart_timeout_s
        )
        .ok();
        writeln!(unit, "StartLimitBurst=0").ok();
        writeln!(unit, "StartLimitAction=none").ok();
    }
    writeln!(unit).ok();

    // -- [Service] section ---------------------------------------------
    writeln!(unit, "[Service]").ok();
    writeln!(unit, "Type=simple").ok();
    writeln!(
        unit,
        "ExecStart={}",
        plain_command_line(&descriptor.executable, &descriptor.args)
    )
    .ok();
    if let Some(dir) = &descriptor.working_directory {
        writeln!(unit, "WorkingDirectory={}", dir.display()).ok();
    }
    if !descriptor.environment.is_empty() {
        let pairs: Vec<String> = descriptor
            .environment
            .iter()
            .map(|(key, val)| format!("{key}={val}"))
            .collect();
        writeln!(unit, "Environment={}", pairs.join(" ")).ok();
    }
    if descriptor.start.restart {
        writeln!(unit, "Restart=always").ok();
        writeln!(unit, "RestartSec={}", descriptor.start.restart_timeout_s).ok();
    } else {
        writeln!(unit, "Restart=on-failure").ok();
    }
    match &descriptor.logging.stdout {
        LogSink::Disabled => {
            writeln!(unit, "StandardOutput=null").ok();
        }
        LogSink::Default => {}
        LogSink::Path(path) => {
            writeln!(unit, "StandardOutput={}", path.display()).ok();
        }
    }
    match &descriptor.logging.stderr {
        LogSink::Disabled => {
            writeln!(unit, "StandardError=null").ok();
        }
        LogSink::Default => {}
        LogSink::Path(path) => {
            writeln!(unit, "StandardError={}", path.display()).ok();
        }
    }
    if !descriptor.credentials.user.is_empty() {
        writeln!(unit, "User={}", descriptor.credentials.user).ok();
    }
    if !descriptor.credentials.group.is_empty() {
        writeln!(unit, "Group={}", descriptor.credentials.group).ok();
    }

    // -- [Install] section ---------------------------------------------
    if descriptor.start.at_boot {
        writeln!(unit).ok();
        writeln!(unit, "[Install]").ok();
        writeln!(unit, "WantedBy=multi-user.target").ok();
    }

    unit
}

/// Parse a systemd unit file into a descriptor.
///
/// Tolerant: unknown directives are skipped, `After=` is accepted as a
/// dependency source alongside `Requires=`, and dependencies with no abstract
/// mapping are dropped.
#[must_use]
pub fn decode(text: &str) -> ServiceDescriptor {
    let mut descriptor = ServiceDescriptor::default();

    for line in text.lines() {
        if let Some(value) = value_after(line, "Description=") {
            descriptor.description = value.to_string();
        } else if let Some(value) = value_after(line, "Documentation=") {
            descriptor.documentation = value.to_string();
        } else if let Some(value) =
            value_after(line, "Requires=").or_else(|| value_after(line, "After="))
        {
            for unit in value.split_whitespace() {
                if let Some(dep) = tags::abstract_from_native(InitKind::Systemd, unit) {
                    if !descriptor.depends_on.contains(&dep) {
                        descriptor.depends_on.push(dep);
                    }
                }
            }
        } else if let Some(value) = value_after(line, "StartLimitIntervalSec=") {
            descriptor.start.restart = true;
            if let Ok(secs) = value.parse() {
                descriptor.start.restart_timeout_s = secs;
            }
        } else if let Some(value) = value_after(line, "ExecStart=") {
            let mut parts = value.split_whitespace();
            descriptor.executable = PathBuf::from(parts.next().unwrap_or_default());
            descriptor.args = parts.map(ToString::to_string).collect();
        } else if let Some(value) = value_after(line, "WorkingDirectory=") {
            if !value.is_empty() {
                descriptor.working_directory = Some(PathBuf::from(value));
            }
        } else if let Some(value) = value_after(line, "Environment=") {
            for pair in value.split_whitespace() {
                if let Some((key, val)) = pair.split_once('=') {
                    descriptor
                        .environment
                        .insert(key.to_string(), val.to_string());
                }
            }
        } else if let Some(value) = value_after(line, "Restart=") {
            descriptor.start.restart = value == "always";
        } else if let Some(value) = value_after(line, "RestartSec=") {
            if let Ok(secs) = value.parse() {
                descriptor.start.restart_timeout_s = secs;
            }
        } else if let Some(value) = value_after(line, "StandardOutput=") {
            descriptor.logging.stdout = parse_log_sink(value);
        } else if let Some(value) = value_after(line, "StandardError=") {
            descriptor.logging.stderr = parse_log_sink(value);
        } else if let Some(value) = value_after(line, "User=") {
            descriptor.credentials.user = value.to_string();
        } else if let Some(value) = value_after(line, "Group=") {
            descriptor.credentials.group = value.to_string();
        } else if value_after(line, "WantedBy=").is_some() {
            descriptor.start.at_boot = true;
        }
    }

    descriptor
}

fn parse_log_sink(value: &str) -> LogSink {
    if value == "null" {
        LogSink::Disabled
    } else {
        LogSink::Path(PathBuf::from(value))
    }
}
