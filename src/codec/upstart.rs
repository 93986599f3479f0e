//! Upstart job codec (`/etc/init/<name>.conf`).
//!
//! Canonical form: the first line is a comment carrying the description,
//! start/stop stanzas pin the usual runlevels, `respawn` (with a 5-in-300s
//! limit) appears when restart is requested, and `exec` carries the command
//! line. The decoder reads the leading comment, the `description` stanza,
//! and the `exec` line.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::codec::{plain_command_line, value_after};
use crate::core::descriptor::ServiceDescriptor;

/// Render a descriptor as an Upstart job file.
#[must_use]
pub fn encode(descriptor: &ServiceDescriptor) -> String {
    let cmd = plain_command_line(&descriptor.executable, &descriptor.args);

    let mut job = String::with_capacity(256);
    writeln!(job, "# {}", descriptor.description).ok();
    writeln!(job).ok();
    writeln!(job, "description     \"{}\"", descriptor.name).ok();
    writeln!(job).ok();
    writeln!(job, "start on filesystem or runlevel [2345]").ok();
    writeln!(job, "stop on runlevel [!2345]").ok();
    writeln!(job).ok();
    if descriptor.start.restart {
        writeln!(job, "# stop the respawn if the process fails to start 5 times within 5 minutes").ok();
        writeln!(job, "respawn").ok();
        writeln!(job, "respawn limit 5 300").ok();
    }
    writeln!(job, "umask 022").ok();
    writeln!(job).ok();
    writeln!(job, "console none").ok();
    writeln!(job).ok();
    writeln!(job, "pre-start script").ok();
    writeln!(
        job,
        "    test -x {} || {{ stop; exit 0; }}",
        descriptor.executable.display()
    )
    .ok();
    writeln!(job, "end script").ok();
    writeln!(job).ok();
    writeln!(job, "exec {cmd}").ok();

    job
}

/// Parse an Upstart job file into a descriptor.
#[must_use]
pub fn decode(text: &str) -> ServiceDescriptor {
    let mut descriptor = ServiceDescriptor::default();

    for (index, line) in text.lines().enumerate() {
        if index == 0 {
            if let Some(value) = line.strip_prefix('#') {
                descriptor.description = value.trim().to_string();
            }
        } else if let Some(value) = value_after(line, "description") {
            let name = value.trim().trim_matches('"');
            if !name.is_empty() {
                descriptor.name = name.to_string();
            }
        } else if let Some(value) = value_after(line, "respawn") {
            if value.is_empty() {
                descriptor.start.restart = true;
            }
        } else if let Some(value) = value_after(line, "exec ") {
            let mut parts = value.split_whitespace();
            descriptor.executable = PathBuf::from(parts.next().unwrap_or_default());
            descriptor.args = parts.map(ToString::to_string).collect();
        }
    }

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::StartPolicy;

    fn sample_descriptor() -> ServiceDescriptor {
        ServiceDescriptor::new("svc-a")
            .unwrap()
            .with_executable("/usr/local/bin/svc-a")
            .with_args(["--verbose"])
            .with_description("sample service")
            .with_start(StartPolicy {
                at_boot: true,
                restart: true,
                restart_timeout_s: 0,
            })
    }

    #[test]
    fn encode_has_runlevel_stanzas() {
        let job = encode(&sample_descriptor());
        assert!(job.starts_with("# sample service\n"));
        assert!(job.contains("description     \"svc-a\""));
        assert!(job.contains("start on filesystem or runlevel [2345]"));
        assert!(job.contains("stop on runlevel [!2345]"));
        assert!(job.contains("exec /usr/local/bin/svc-a --verbose"));
    }

    #[test]
    fn encode_respawn_only_with_restart() {
        let job = encode(&sample_descriptor());
        assert!(job.contains("respawn\n"));
        assert!(job.contains("respawn limit 5 300"));

        let mut descriptor = sample_descriptor();
        descriptor.start.restart = false;
        let job = encode(&descriptor);
        assert!(!job.contains("respawn"));
    }

    #[test]
    fn encode_guards_missing_executable() {
        let job = encode(&sample_descriptor());
        assert!(job.contains("pre-start script"));
        assert!(job.contains("test -x /usr/local/bin/svc-a || { stop; exit 0; }"));
        assert!(job.contains("end script"));
    }

    #[test]
    fn decode_reads_comment_exec_and_name() {
        let descriptor = decode(&encode(&sample_descriptor()));
        assert_eq!(descriptor.name, "svc-a");
        assert_eq!(descriptor.description, "sample service");
        assert_eq!(descriptor.executable, PathBuf::from("/usr/local/bin/svc-a"));
        assert_eq!(descriptor.args, vec!["--verbose".to_string()]);
        assert!(descriptor.start.restart);
    }

    #[test]
    fn decode_plain_job_file() {
        let job = "# my job\nexec /bin/app run now\n";
        let descriptor = decode(job);
        assert_eq!(descriptor.description, "my job");
        assert_eq!(descriptor.executable, PathBuf::from("/bin/app"));
        assert_eq!(descriptor.args, vec!["run".to_string(), "now".to_string()]);
        assert!(!descriptor.start.restart);
    }

    #[test]
    fn decode_without_respawn_is_not_restart() {
        let mut descriptor = sample_descriptor();
        descriptor.start.restart = false;
        let decoded = decode(&encode(&descriptor));
        assert!(!decoded.start.restart);
    }
}
