//! Init-framework detection.
//!
//! On macOS, Windows, and FreeBSD the framework is fixed at compile time. On
//! Linux the detector reads `/proc/1/cmdline` and classifies PID 1, chasing
//! symlinks for the `init`-that-is-really-systemd case some distributions
//! ship. The result is cached for the process lifetime.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::core::tags::InitKind;

/// The init framework this host uses, detected once and cached.
#[must_use]
pub fn detected_init() -> InitKind {
    static DETECTED: OnceLock<InitKind> = OnceLock::new();
    *DETECTED.get_or_init(detect_init)
}

fn detect_init() -> InitKind {
    #[cfg(target_os = "macos")]
    {
        InitKind::Launchd
    }
    #[cfg(target_os = "windows")]
    {
        InitKind::WindowsScm
    }
    #[cfg(target_os = "freebsd")]
    {
        InitKind::RcD
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "freebsd")))]
    {
        match std::fs::read("/proc/1/cmdline") {
            Ok(cmdline) => classify_init(&cmdline, |path| std::fs::canonicalize(path)),
            Err(error) => {
                tracing::error!(%error, "cannot read /proc/1/cmdline to detect init framework");
                InitKind::Unknown
            }
        }
    }
}

/// Classify PID 1's command line.
///
/// `resolve` chases symlinks on the init binary; it is injected so the rules
/// are testable without a live `/proc`. Unreadable or empty input yields
/// `Unknown`; callers that must pick a controller fall back to SysV.
#[cfg_attr(
    any(target_os = "macos", target_os = "windows", target_os = "freebsd"),
    allow(dead_code)
)]
pub(crate) fn classify_init(
    cmdline: &[u8],
    resolve: impl Fn(&Path) -> io::Result<PathBuf>,
) -> InitKind {
    // Some kernels pad the cmdline with trailing NULs; argument separators
    // are NULs too, so turn them into spaces before matching.
    let trimmed: Vec<u8> = {
        let mut bytes = cmdline.to_vec();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        bytes.iter().map(|&b| if b == 0 { b' ' } else { b }).collect()
    };
    let init = String::from_utf8_lossy(&trimmed);

    if init.is_empty() {
        return InitKind::Unknown;
    }
    if init.contains("init [") {
        return InitKind::SystemV;
    }
    if init.contains("systemd") {
        return InitKind::Systemd;
    }
    if init.contains("init") {
        // Not so fast: "init" may be a symlink to systemd (Debian does that).
        let target = if init.starts_with("/sbin/init") {
            resolve(Path::new("/sbin/init"))
        } else {
            resolve(Path::new(init.trim()))
        };
        if let Ok(target) = target
            && target.to_string_lossy().contains("systemd")
        {
            return InitKind::Systemd;
        }
        return InitKind::Upstart;
    }

    // Nothing recognisable; SysV is the least-capable safe assumption.
    InitKind::SystemV
}
