//! SVK-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, SvcError>;

/// Top-level error type for svckit.
///
/// The first group (`SVK-1xxx`) is the portable taxonomy callers are expected
/// to match on; the second group (`SVK-2xxx`) wraps transport failures from
/// file I/O, external tools, and the Windows service manager.
#[derive(Debug, Error)]
pub enum SvcError {
    #[error("[SVK-1001] service does not exist")]
    ServiceDoesNotExist,

    #[error("[SVK-1002] service config error: {details}")]
    ServiceConfigError { details: String },

    #[error("[SVK-1003] unsupported request: {details}")]
    UnsupportedRequest { details: String },

    #[error("[SVK-1004] invalid service descriptor: {details}")]
    InvalidDescriptor { details: String },

    #[error("[SVK-2001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SVK-2002] {tool} failure: {details}")]
    Tool {
        tool: &'static str,
        details: String,
    },

    #[error("[SVK-2003] service manager failure: {details}")]
    Scm { details: String },
}

impl SvcError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ServiceDoesNotExist => "SVK-1001",
            Self::ServiceConfigError { .. } => "SVK-1002",
            Self::UnsupportedRequest { .. } => "SVK-1003",
            Self::InvalidDescriptor { .. } => "SVK-1004",
            Self::Io { .. } => "SVK-2001",
            Self::Tool { .. } => "SVK-2002",
            Self::Scm { .. } => "SVK-2003",
        }
    }

    /// Whether this is a transport failure (unexpected I/O, subprocess, or
    /// service-manager error) rather than part of the portable taxonomy.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Tool { .. } | Self::Scm { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
