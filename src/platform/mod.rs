//! Small host-environment helpers shared by the controllers.

use std::path::PathBuf;

/// Whether the current process runs with root privileges.
///
/// Controllers use this to pick system vs user install paths and to decide
/// whether `systemctl` needs `--user`. Always false on non-Unix platforms.
#[must_use]
#[cfg_attr(windows, allow(dead_code))]
pub(crate) fn is_root() -> bool {
    #[cfg(unix)]
    {
        nix::unistd::geteuid().is_root()
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// The current user's home directory, from `$HOME`.
#[must_use]
#[cfg_attr(windows, allow(dead_code))]
pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
}
