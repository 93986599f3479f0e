//! Platform and init-framework tags, plus the abstract-dependency mapping table.

use serde::{Deserialize, Serialize};

/// Operating systems a descriptor can carry per-OS dependency overrides for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsTag {
    /// Linux (any init framework).
    Linux,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
    /// FreeBSD.
    FreeBsd,
    /// OpenBSD.
    OpenBsd,
    /// NetBSD.
    NetBsd,
}

impl OsTag {
    /// The tag for the OS this crate was compiled for, if it is a supported one.
    #[must_use]
    pub const fn current() -> Option<Self> {
        #[cfg(target_os = "linux")]
        {
            Some(Self::Linux)
        }
        #[cfg(target_os = "macos")]
        {
            Some(Self::MacOs)
        }
        #[cfg(target_os = "windows")]
        {
            Some(Self::Windows)
        }
        #[cfg(target_os = "freebsd")]
        {
            Some(Self::FreeBsd)
        }
        #[cfg(target_os = "openbsd")]
        {
            Some(Self::OpenBsd)
        }
        #[cfg(target_os = "netbsd")]
        {
            Some(Self::NetBsd)
        }
        #[cfg(not(any(
            target_os = "linux",
            target_os = "macos",
            target_os = "windows",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        )))]
        {
            None
        }
    }
}

/// Init frameworks the crate knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitKind {
    /// systemd (modern Linux).
    Systemd,
    /// SysV init scripts under `/etc/init.d`.
    SystemV,
    /// Upstart (`/etc/init/*.conf`).
    Upstart,
    /// launchd (macOS).
    Launchd,
    /// FreeBSD rc.d.
    RcD,
    /// Windows Service Control Manager.
    WindowsScm,
    /// Detection failed.
    Unknown,
}

/// Framework-independent service dependency tags.
///
/// Each tag is translated to a framework-specific unit name by
/// [`native_unit`]; tags with no mapping on a given framework are silently
/// dropped at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum AbstractService {
    /// Networking is up.
    Network,
    /// Bluetooth stack is available.
    Bluetooth,
}

/// Translate an abstract dependency to the unit name the given framework uses.
#[must_use]
pub fn native_unit(init: InitKind, dep: AbstractService) -> Option<&'static str> {
    match (init, dep) {
        (InitKind::Systemd, AbstractService::Network) => Some("network.target"),
        (InitKind::Systemd, AbstractService::Bluetooth) => Some("bluetooth.target"),
        (InitKind::RcD, AbstractService::Network) => Some("NETWORKING"),
        (InitKind::RcD, AbstractService::Bluetooth) => Some("bluetooth"),
        (InitKind::SystemV | InitKind::Upstart, AbstractService::Network) => Some("$network"),
        _ => None,
    }
}

/// Reverse lookup used by decoders: native unit name back to the abstract tag.
#[must_use]
pub fn abstract_from_native(init: InitKind, unit: &str) -> Option<AbstractService> {
    for dep in [AbstractService::Network, AbstractService::Bluetooth] {
        if native_unit(init, dep) == Some(unit) {
            return Some(dep);
        }
    }
    None
}

/// Map a resolved dependency set to native unit names, dropping unknowns.
#[must_use]
pub fn map_depends_on(init: InitKind, deps: &[AbstractService]) -> Vec<&'static str> {
    deps.iter()
        .filter_map(|dep| native_unit(init, *dep))
        .collect()
}
