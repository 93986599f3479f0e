//! SysV init-script codec (`/etc/init.d/<name>`).
//!
//! The encoder renders a fixed POSIX-sh template with an LSB
//! `### BEGIN INIT INFO` header, a `cmd="…"` line (shell-quoted so arguments
//! with whitespace survive a round trip), a pid file under `/var/run`, and
//! start/stop/restart/status cases. The decoder picks out the handful of
//! lines the template owns and ignores everything else.

use std::path::PathBuf;

use crate::codec::{quoted_command_line, split_command_line, strip_quotes, value_after};
use crate::core::descriptor::{LogSink, ServiceDescriptor};
use crate::core::tags::{self, InitKind, OsTag};

/// Render a descriptor as a SysV init script.
#[must_use]
pub fn encode(descriptor: &ServiceDescriptor) -> String {
    let depends_on = tags::map_depends_on(
        InitKind::SystemV,
        descriptor.resolved_depends_on(OsTag::current(), InitKind::SystemV),
    );

    let name = &descriptor.name;
    let description = &descriptor.description;
    let cmd = quoted_command_line(&descriptor.executable, &descriptor.args);
    let required_start = depends_on.join(" ");
    let stdout_log = log_value(&descriptor.logging.stdout, name, "log");
    let stderr_log = log_value(&descriptor.logging.stderr, name, "err");

    format!(
        r#"#!/bin/sh
# For RedHat and cousins:
# chkconfig: - 99 01
# description: {description}
# processname: {name}

### BEGIN INIT INFO
# Provides:          {name}
# Required-Start:    {required_start}
# Required-Stop:
# Default-Start:     2 3 4 5
# Default-Stop:      0 1 6
# Short-Description: {name}
# Description:       {description}
### END INIT INFO

cmd="{cmd}"

name=$(basename $0)
pid_file="/var/run/$name.pid"
stdout_log="{stdout_log}"
stderr_log="{stderr_log}"

get_pid() {{
    cat "$pid_file"
}}

is_running() {{
    [ -f "$pid_file" ] && ps $(get_pid) > /dev/null 2>&1
}}

case "$1" in
    start)
        if is_running; then
            echo "Already started"
        else
            echo "Starting $name"
            $cmd >> "$stdout_log" 2>> "$stderr_log" &
            echo $! > "$pid_file"
            if ! is_running; then
                echo "Unable to start, see $stdout_log and $stderr_log"
                exit 1
            fi
        fi
    ;;
    stop)
        if is_running; then
            echo -n "Stopping $name.."
            kill $(get_pid)
            for i in 1 2 3 4 5 6 7 8 9 10
            do
                if ! is_running; then
                    break
                fi
                echo -n "."
                sleep 1
            done
            echo
            if is_running; then
                echo "Not stopped; may still be shutting down or shutdown may have failed"
                exit 1
            else
                echo "Stopped"
                if [ -f "$pid_file" ]; then
                    rm "$pid_file"
                fi
            fi
        else
            echo "Not running"
        fi
    ;;
    restart)
        $0 stop
        if is_running; then
            echo "Unable to stop, will not attempt to start"
            exit 1
        fi
        $0 start
    ;;
    status)
        if is_running; then
            echo "Running"
        else
            echo "Stopped"
            exit 1
        fi
    ;;
    *)
    echo "Usage: $0 {{start|stop|restart|status}}"
    exit 1
    ;;
esac
exit 0
"#
    )
}

/// Parse a SysV init script into a descriptor.
#[must_use]
pub fn decode(text: &str) -> ServiceDescriptor {
    let mut descriptor = ServiceDescriptor::default();

    for line in text.lines() {
        if let Some(value) = value_after(line, "# Provides:") {
            descriptor.name = value.to_string();
        } else if let Some(value) = value_after(line, "# Required-Start:") {
            for unit in value.split_whitespace() {
                if let Some(dep) = tags::abstract_from_native(InitKind::SystemV, unit)
                    && !descriptor.depends_on.contains(&dep)
                {
                    descriptor.depends_on.push(dep);
                }
            }
        } else if let Some(value) = value_after(line, "# Description:") {
            descriptor.description = value.to_string();
        } else if let Some(value) = value_after(line, "cmd=") {
            let (executable, args) = split_command_line(strip_quotes(value));
            descriptor.executable = PathBuf::from(executable);
            descriptor.args = args;
        } else if let Some(value) = value_after(line, "stdout_log=") {
            descriptor.logging.stdout = parse_log_value(strip_quotes(value));
        } else if let Some(value) = value_after(line, "stderr_log=") {
            descriptor.logging.stderr = parse_log_value(strip_quotes(value));
        }
    }

    descriptor
}

fn log_value(sink: &LogSink, name: &str, extension: &str) -> String {
    match sink {
        LogSink::Disabled => "/dev/null".to_string(),
        LogSink::Default => format!("/var/log/{name}.{extension}"),
        LogSink::Path(path) => path.display().to_string(),
    }
}

fn parse_log_value(value: &str) -> LogSink {
    if value == "/dev/null" {
        LogSink::Disabled
    } else {
        LogSink::Path(PathBuf::from(value))
    }
}
