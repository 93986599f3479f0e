//! Bidirectional codecs between the portable descriptor and each init
//! framework's native unit-file text.
//!
//! Codecs never perform I/O. Encoders write the canonical form for their
//! framework; decoders are tolerant — unrecognised directives are ignored and
//! missing fields are left at their defaults.

pub mod launchd;
pub mod rcd;
pub mod systemd;
pub mod sysv;
pub mod upstart;

use std::path::Path;

/// Join executable and args into a single command line, unquoted.
///
/// Used where the framework re-splits on whitespace (systemd `ExecStart=`,
/// upstart `exec`); arguments containing whitespace are not representable
/// there.
pub(crate) fn plain_command_line(executable: &Path, args: &[String]) -> String {
    let mut line = executable.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Join executable and args with shell-safe quoting of arguments that need it.
///
/// Used for shell-script formats (`cmd="…"` in SysV scripts) where args with
/// embedded whitespace must survive a round trip.
pub(crate) fn quoted_command_line(executable: &Path, args: &[String]) -> String {
    let mut line = executable.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&shell_quote(arg));
    }
    line
}

/// Quote one shell word if it needs it.
pub(crate) fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let needs_quoting = arg
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '$' | '`' | '\\' | '&' | ';'));
    if !needs_quoting {
        return arg.to_string();
    }
    // POSIX single-quote form: close, escape the quote, reopen.
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Split a shell-ish command line back into executable and args, honouring
/// single and double quotes.
pub(crate) fn split_command_line(line: &str) -> (String, Vec<String>) {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                    in_word = true;
                } else if c == '\\' {
                    // Unquoted backslash escapes the next character (the
                    // `'\''` sequence emitted by shell_quote lands here).
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                        in_word = true;
                    }
                } else if c.is_whitespace() {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                } else {
                    current.push(c);
                    in_word = true;
                }
            }
        }
    }
    if in_word {
        words.push(current);
    }

    let mut iter = words.into_iter();
    let executable = iter.next().unwrap_or_default();
    (executable, iter.collect())
}

/// The value after `key` on a trimmed line, or `None` if the line is not a
/// `key` directive.
pub(crate) fn value_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.trim().strip_prefix(key).map(str::trim)
}

/// Strip one layer of wrapping double quotes.
pub(crate) fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Minimal XML escaping for plist values.
pub(crate) fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn plain_command_line_joins_with_spaces() {
        let line = plain_command_line(&PathBuf::from("/bin/echo"), &["hi".to_string()]);
        assert_eq!(line, "/bin/echo hi");
    }

    #[test]
    fn shell_quote_leaves_plain_words_alone() {
        assert_eq!(shell_quote("--verbose"), "--verbose");
        assert_eq!(shell_quote("/var/lib/svc"), "/var/lib/svc");
    }

    #[test]
    fn shell_quote_wraps_words_with_whitespace() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn split_command_line_round_trips_quoted_args() {
        let exec = PathBuf::from("/usr/local/bin/app");
        let args = vec!["--name".to_string(), "a b c".to_string(), "it's".to_string()];
        let line = quoted_command_line(&exec, &args);
        let (parsed_exec, parsed_args) = split_command_line(&line);
        assert_eq!(parsed_exec, "/usr/local/bin/app");
        assert_eq!(parsed_args, args);
    }

    #[test]
    fn split_command_line_handles_plain_lines() {
        let (exec, args) = split_command_line("/bin/echo hi there");
        assert_eq!(exec, "/bin/echo");
        assert_eq!(args, vec!["hi".to_string(), "there".to_string()]);
    }

    #[test]
    fn value_after_matches_trimmed_prefix() {
        assert_eq!(value_after("  Description=hello ", "Description="), Some("hello"));
        assert_eq!(value_after("RestartSec=5", "Restart="), None);
        assert_eq!(value_after("Description=", "Description="), Some(""));
    }

    #[test]
    fn strip_quotes_removes_one_layer() {
        assert_eq!(strip_quotes("\"/bin/app\""), "/bin/app");
        assert_eq!(strip_quotes("/bin/app"), "/bin/app");
        assert_eq!(strip_quotes("\"unbalanced"), "\"unbalanced");
    }

    #[test]
    fn xml_escape_covers_reserved_characters() {
        assert_eq!(xml_escape("a<b>&\"'"), "a&lt;b&gt;&amp;&quot;&apos;");
        assert_eq!(xml_escape("/plain/path"), "/plain/path");
    }
}
