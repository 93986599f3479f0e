//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use svckit::prelude::*;
//! ```

// Core
pub use crate::core::descriptor::{
    Credentials, LogPolicy, LogSink, ServiceDescriptor, ServiceInfo, StartPolicy, StopHandler,
};
pub use crate::core::errors::{Result, SvcError};
pub use crate::core::tags::{AbstractService, InitKind, OsTag};

// Detection
pub use crate::detect::detected_init;

// Façade
pub use crate::manager::Service;

// Service-side runtime (programs running *as* a Windows service)
#[cfg(windows)]
pub use crate::control::windows_run::run_service_loop;
