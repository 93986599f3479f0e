//! FreeBSD rc.d script codec (`/etc/rc.d/<name>`).
//!
//! Canonical form follows `rc.subr(8)`: `# PROVIDE:` / `# REQUIRE:` header,
//! `name=` / `rcvar=`, optional `export` environment lines, per-service
//! `_user` / `_group` / `_chdir` variables, `command=` / `command_args=`, and
//! the `load_rc_config` / `run_rc_command` trailer.
//!
//! The encoder always returns the unit body; enabling the service at boot is
//! an `/etc/rc.conf` side effect owned by the rc.d controller, not the codec.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::codec::{quoted_command_line, split_command_line, strip_quotes, value_after};
use crate::core::descriptor::{LogSink, ServiceDescriptor};
use crate::core::tags::{self, InitKind, OsTag};

/// Render a descriptor as an rc.d script.
#[must_use]
pub fn encode(descriptor: &ServiceDescriptor) -> String {
    let depends_on = tags::map_depends_on(
        InitKind::RcD,
        descriptor.resolved_depends_on(OsTag::current(), InitKind::RcD),
    );

    let name = &descriptor.name;
    let mut script = String::with_capacity(512);

    writeln!(script, "#!/bin/sh").ok();
    writeln!(script).ok();
    writeln!(script, "# PROVIDE: {name}").ok();
    writeln!(script, "# REQUIRE: {}", depends_on.join(" ")).ok();
    writeln!(script, "# Description: {}", descriptor.description).ok();
    writeln!(script, "# Documentation: {}", descriptor.documentation).ok();
    writeln!(script).ok();
    writeln!(script, ". /etc/rc.subr").ok();
    writeln!(script).ok();
    writeln!(script, "name={name}").ok();
    writeln!(script, "rcvar={name}_enable").ok();
    writeln!(script).ok();
    for (key, val) in &descriptor.environment {
        writeln!(script, "export {key}={val}").ok();
    }
    if !descriptor.credentials.user.is_empty() {
        writeln!(script, "{name}_user=\"{}\"", descriptor.credentials.user).ok();
    }
    if !descriptor.credentials.group.is_empty() {
        writeln!(script, "{name}_group=\"{}\"", descriptor.credentials.group).ok();
    }
    writeln!(script, "command=\"{}\"", descriptor.executable.display()).ok();
    let args = if descriptor.args.is_empty() {
        String::new()
    } else {
        let quoted = quoted_command_line(&descriptor.executable, &descriptor.args);
        quoted
            .strip_prefix(&format!("{} ", descriptor.executable.display()))
            .unwrap_or("")
            .to_string()
    };
    writeln!(script, "command_args=\"{args}\"").ok();
    writeln!(script, "pidfile=\"/var/run/${{name}}.pid\"").ok();
    if let Some(dir) = &descriptor.working_directory {
        writeln!(script, "{name}_chdir=\"{}\"", dir.display()).ok();
    }
    writeln!(script).ok();
    writeln!(script, "load_rc_config $name").ok();
    writeln!(script, "run_rc_command \"$1\"").ok();

    script
}

/// Parse an rc.d script into a descriptor.
#[must_use]
pub fn decode(text: &str) -> ServiceDescriptor {
    let mut descriptor = ServiceDescriptor::default();

    for line in text.lines() {
        if let Some(value) = value_after(line, "# PROVIDE:") {
            descriptor.name = value.to_string();
        } else if let Some(value) = value_after(line, "# REQUIRE:") {
            for unit in value.split_whitespace() {
                if let Some(dep) = tags::abstract_from_native(InitKind::RcD, unit)
                    && !descriptor.depends_on.contains(&dep)
                {
                    descriptor.depends_on.push(dep);
                }
            }
        } else if let Some(value) = value_after(line, "# Description:") {
            descriptor.description = value.to_string();
        } else if let Some(value) = value_after(line, "# Documentation:") {
            descriptor.documentation = value.to_string();
        } else if let Some(value) = value_after(line, "name=") {
            descriptor.name = value.to_string();
        } else if let Some(value) = value_after(line, "export ") {
            if let Some((key, val)) = value.split_once('=') {
                descriptor
                    .environment
                    .insert(key.to_string(), val.to_string());
            }
        } else if let Some(value) = value_after(line, "command=") {
            descriptor.executable = PathBuf::from(strip_quotes(value));
        } else if let Some(value) = value_after(line, "command_args=") {
            let inner = strip_quotes(value);
            if !inner.is_empty() {
                // command_args holds only the args; prepend a dummy word so
                // the shared splitter can be reused.
                let (_, args) = split_command_line(&format!("x {inner}"));
                descriptor.args = args;
            }
        } else if let Some(value) = line.trim().split_once("_user=").map(|(_, v)| v) {
            descriptor.credentials.user = strip_quotes(value).to_string();
        } else if let Some(value) = line.trim().split_once("_group=").map(|(_, v)| v) {
            descriptor.credentials.group = strip_quotes(value).to_string();
        } else if let Some(value) = line.trim().split_once("_chdir=").map(|(_, v)| v) {
            descriptor.working_directory = Some(PathBuf::from(strip_quotes(value)));
        } else if let Some(value) = value_after(line, "stdout_log=") {
            descriptor.logging.stdout = LogSink::Path(PathBuf::from(strip_quotes(value)));
        } else if let Some(value) = value_after(line, "stderr_log=") {
            descriptor.logging.stderr = LogSink::Path(PathBuf::from(strip_quotes(value)));
        }
    }

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tags::AbstractService;

    fn sample_descriptor() -> ServiceDescriptor {
        let mut descriptor = ServiceDescriptor::new("svca")
            .unwrap()
            .with_executable("/usr/local/bin/svca")
            .with_args(["--listen", "0.0.0.0:8080"])
            .with_description("sample service")
            .with_working_directory("/var/db/svca");
        descriptor.documentation = "https://example.com/svca".to_string();
        descriptor.depends_on = vec![AbstractService::Network];
        descriptor
            .environment
            .insert("SVCA_HOME".to_string(), "/var/db/svca".to_string());
        descriptor.credentials.user = "svca".to_string();
        descriptor.credentials.group = "svca".to_string();
        descriptor
    }

    #[test]
    fn encode_has_rc_subr_scaffolding() {
        let script = encode(&sample_descriptor());
        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains("# PROVIDE: svca"));
        assert!(script.contains("# REQUIRE: NETWORKING"));
        assert!(script.contains(". /etc/rc.subr"));
        assert!(script.contains("name=svca"));
        assert!(script.contains("rcvar=svca_enable"));
        assert!(script.contains("pidfile=\"/var/run/${name}.pid\""));
        assert!(script.contains("load_rc_config $name"));
        assert!(script.contains("run_rc_command \"$1\""));
    }

    #[test]
    fn encode_command_and_args() {
        let script = encode(&sample_descriptor());
        assert!(script.contains("command=\"/usr/local/bin/svca\""));
        assert!(script.contains("command_args=\"--listen 0.0.0.0:8080\""));
    }

    #[test]
    fn encode_identity_and_chdir() {
        let script = encode(&sample_descriptor());
        assert!(script.contains("svca_user=\"svca\""));
        assert!(script.contains("svca_group=\"svca\""));
        assert!(script.contains("svca_chdir=\"/var/db/svca\""));
        assert!(script.contains("export SVCA_HOME=/var/db/svca"));
    }

    #[test]
    fn encode_returns_unit_body_not_rc_conf() {
        // The encoder must never leak /etc/rc.conf content; boot enablement
        // is the controller's side effect.
        let script = encode(&sample_descriptor());
        assert!(!script.contains("_enable=\"YES\""));
    }

    #[test]
    fn decode_round_trips_encode() {
        let descriptor = sample_descriptor();
        let decoded = decode(&encode(&descriptor));
        assert_eq!(decoded.name, descriptor.name);
        assert_eq!(decoded.description, descriptor.description);
        assert_eq!(decoded.documentation, descriptor.documentation);
        assert_eq!(decoded.executable, descriptor.executable);
        assert_eq!(decoded.args, descriptor.args);
        assert_eq!(decoded.working_directory, descriptor.working_directory);
        assert_eq!(decoded.environment, descriptor.environment);
        assert_eq!(decoded.depends_on, descriptor.depends_on);
        assert_eq!(decoded.credentials, descriptor.credentials);
    }

    #[test]
    fn decode_recognises_log_lines() {
        let script = "#!/bin/sh\nstdout_log=\"/var/log/svca.log\"\nstderr_log=\"/var/log/svca.err\"\n";
        let descriptor = decode(script);
        assert_eq!(
            descriptor.logging.stdout,
            LogSink::Path(PathBuf::from("/var/log/svca.log"))
        );
        assert_eq!(
            descriptor.logging.stderr,
            LogSink::Path(PathBuf::from("/var/log/svca.err"))
        );
    }

    #[test]
    fn decode_empty_args_stays_empty() {
        let descriptor = ServiceDescriptor::new("svca")
            .unwrap()
            .with_executable("/usr/local/bin/svca");
        let decoded = decode(&encode(&descriptor));
        assert!(decoded.args.is_empty());
    }
}
