#![cfg_attr(not(windows), forbid(unsafe_code))]

//! svckit — portable system-service management.
//!
//! Describe a long-running service once with a [`core::descriptor::ServiceDescriptor`],
//! then let the [`manager::Service`] façade install it into whichever init
//! framework the host runs (systemd, launchd, SysV init, Upstart, FreeBSD
//! rc.d, or the Windows SCM), drive its lifecycle, and read native service
//! definitions back into the portable form.
//!
//! Layering:
//! 1. **Portable model** (`core`) — descriptor, info record, error taxonomy.
//! 2. **Codecs** (`codec`) — pure text transforms between the descriptor and
//!    each framework's unit-file format.
//! 3. **Controllers** (`control`) — per-framework install/start/stop/info via
//!    native tools or the SCM API.
//! 4. **Detection + façade** (`detect`, `manager`) — pick the right
//!    controller for the host.

pub mod codec;
pub mod control;
pub mod core;
pub mod detect;
pub mod manager;
pub mod prelude;

pub(crate) mod platform;
