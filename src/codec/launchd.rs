//! launchd property-list codec.
//!
//! The encoder writes the canonical XML plist form; the decoder parses with
//! the `plist` crate and tolerates unknown keys, malformed documents (which
//! yield an empty descriptor), and `KeepAlive` expressed either as a boolean
//! or as the dictionary form newer launchd configs use.

use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::warn;

use crate::codec::xml_escape;
use crate::core::descriptor::{LogSink, ServiceDescriptor};

/// Render a descriptor as a launchd plist.
#[must_use]
pub fn encode(descriptor: &ServiceDescriptor) -> String {
    let mut plist = String::with_capacity(512);

    plist.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    plist.push_str(
        "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
    );
    plist.push_str("<plist version=\"1.0\">\n");
    plist.push_str("<dict>\n");

    writeln!(plist, "    <key>Label</key>").ok();
    writeln!(plist, "    <string>{}</string>", xml_escape(&descriptor.name)).ok();

    writeln!(plist, "    <key>ProgramArguments</key>").ok();
    writeln!(plist, "    <array>").ok();
    writeln!(
        plist,
        "        <string>{}</string>",
        xml_escape(&descriptor.executable.to_string_lossy())
    )
    .ok();
    for arg in &descriptor.args {
        writeln!(plist, "        <string>{}</string>", xml_escape(arg)).ok();
    }
    writeln!(plist, "    </array>").ok();

    if let Some(dir) = &descriptor.working_directory {
        writeln!(plist, "    <key>WorkingDirectory</key>").ok();
        writeln!(
            plist,
            "    <string>{}</string>",
            xml_escape(&dir.to_string_lossy())
        )
        .ok();
    }

    if descriptor.start.at_boot {
        writeln!(plist, "    <key>RunAtLoad</key>").ok();
        writeln!(plist, "    <true/>").ok();
    }
    if descriptor.start.restart {
        writeln!(plist, "    <key>KeepAlive</key>").ok();
        writeln!(plist, "    <true/>").ok();
    }

    if let LogSink::Path(path) = &descriptor.logging.stdout {
        writeln!(plist, "    <key>StandardOutPath</key>").ok();
        writeln!(
            plist,
            "    <string>{}</string>",
            xml_escape(&path.to_string_lossy())
        )
        .ok();
    }
    if let LogSink::Path(path) = &descriptor.logging.stderr {
        writeln!(plist, "    <key>StandardErrorPath</key>").ok();
        writeln!(
            plist,
            "    <string>{}</string>",
            xml_escape(&path.to_string_lossy())
        )
        .ok();
    }

    if !descriptor.credentials.user.is_empty() {
        writeln!(plist, "    <key>UserName</key>").ok();
        writeln!(
            plist,
            "    <string>{}</string>",
            xml_escape(&descriptor.credentials.user)
        )
        .ok();
    }

    plist.push_str("</dict>\n");
    plist.push_str("</plist>\n");

    plist
}

/// Parse a launchd plist into a descriptor.
#[must_use]
pub fn decode(text: &str) -> ServiceDescriptor {
    let mut descriptor = ServiceDescriptor::default();

    let value = match plist::Value::from_reader_xml(text.as_bytes()) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, "failed to parse launchd plist");
            return descriptor;
        }
    };
    let Some(dict) = value.as_dictionary() else {
        warn!("launchd plist root is not a dict");
        return descriptor;
    };

    if let Some(label) = dict.get("Label").and_then(plist::Value::as_string) {
        descriptor.name = label.to_string();
    }

    if let Some(program_arguments) = dict.get("ProgramArguments").and_then(plist::Value::as_array)
    {
        let mut strings = program_arguments
            .iter()
            .filter_map(plist::Value::as_string);
        if let Some(executable) = strings.next() {
            descriptor.executable = PathBuf::from(executable);
        }
        descriptor.args = strings.map(ToString::to_string).collect();
    }

    if let Some(dir) = dict.get("WorkingDirectory").and_then(plist::Value::as_string) {
        descriptor.working_directory = Some(PathBuf::from(dir));
    }

    if let Some(run_at_load) = dict.get("RunAtLoad").and_then(plist::Value::as_boolean) {
        descriptor.start.at_boot = run_at_load;
    }
    if let Some(keep_alive) = dict.get("KeepAlive") {
        // Either <true/> or the dictionary form (e.g. SuccessfulExit).
        descriptor.start.restart =
            keep_alive.as_boolean().unwrap_or_else(|| keep_alive.as_dictionary().is_some());
    }

    if let Some(path) = dict.get("StandardOutPath").and_then(plist::Value::as_string) {
        descriptor.logging.stdout = LogSink::Path(PathBuf::from(path));
    }
    if let Some(path) = dict.get("StandardErrorPath").and_then(plist::Value::as_string) {
        descriptor.logging.stderr = LogSink::Path(PathBuf::from(path));
    }

    if let Some(user) = dict.get("UserName").and_then(plist::Value::as_string) {
        descriptor.credentials.user = user.to_string();
    }

    descriptor
}
