//! Per-framework lifecycle controllers.
//!
//! Each controller translates the abstract operations (`install`,
//! `uninstall`, `start`, `stop`, `info`) into native tool invocations or SCM
//! API calls and maps the framework's textual failures onto the portable
//! error taxonomy. All tool output flows through [`exec::run_tool`], so the
//! fragile substring heuristics live in per-controller tables here rather
//! than scattered across call sites.

pub(crate) mod exec;

#[cfg(unix)]
pub(crate) mod launchd;
#[cfg(unix)]
pub(crate) mod rcd;
#[cfg(unix)]
pub(crate) mod systemd;
#[cfg(unix)]
pub(crate) mod sysv;
#[cfg(unix)]
pub(crate) mod upstart;
#[cfg(windows)]
pub(crate) mod windows;
#[cfg(windows)]
pub mod windows_run;

use std::time::Duration;

use crate::core::descriptor::ServiceInfo;
use crate::core::errors::{Result, SvcError};

/// The capability set every framework controller implements.
pub trait Controller: Send + Sync {
    /// Write (or register) the service definition.
    fn install(&self) -> Result<()>;
    /// Remove the service definition; missing services are not an error.
    fn uninstall(&self) -> Result<()>;
    /// Start the service.
    fn start(&self) -> Result<()>;
    /// Stop the service.
    fn stop(&self) -> Result<()>;
    /// Query the service state.
    fn info(&self) -> ServiceInfo;
}

/// How a matched tool-output substring changes the operation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MappedOutcome {
    /// The service has no on-disk file or SCM entry.
    DoesNotExist,
    /// The on-disk unit is syntactically invalid per the native tool.
    ConfigError,
    /// The tool complained but the operation is semantically a no-op.
    Success,
}

impl MappedOutcome {
    /// Turn the outcome into an operation result.
    pub(crate) fn into_result(self, details: &str) -> Result<()> {
        match self {
            Self::DoesNotExist => Err(SvcError::ServiceDoesNotExist),
            Self::ConfigError => Err(SvcError::ServiceConfigError {
                details: details.trim().to_string(),
            }),
            Self::Success => Ok(()),
        }
    }
}

/// Find the first mapping whose substrings all occur in `text`.
pub(crate) fn find_mapping(
    text: &str,
    table: &[(&[&str], MappedOutcome)],
) -> Option<MappedOutcome> {
    table
        .iter()
        .find(|(needles, _)| needles.iter().all(|needle| text.contains(needle)))
        .map(|(_, outcome)| *outcome)
}

/// Stop polling cadence shared by controllers: 10 attempts, 3 s apart.
pub(crate) const STOP_POLL_ATTEMPTS: u32 = 10;
pub(crate) const STOP_POLL_WAIT: Duration = Duration::from_secs(3);

/// Poll `info` until the service leaves the running state.
///
/// Returns `true` once the service is stopped (or reported missing), `false`
/// if it was still running after the attempt budget.
pub(crate) fn poll_until_stopped(info: impl Fn() -> ServiceInfo) -> bool {
    for attempt in 0..STOP_POLL_ATTEMPTS {
        let current = info();
        let missing = matches!(current.error, Some(SvcError::ServiceDoesNotExist));
        if !current.is_running || missing {
            return true;
        }
        tracing::debug!(attempt, "service still running, waiting before next stop probe");
        std::thread::sleep(STOP_POLL_WAIT);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::ServiceDescriptor;

    #[test]
    fn find_mapping_requires_all_substrings() {
        let table: &[(&[&str], MappedOutcome)] = &[
            (&["Failed to enable", "does not exist"], MappedOutcome::DoesNotExist),
            (&["Removed"], MappedOutcome::Success),
        ];

        assert_eq!(
            find_mapping(
                "Failed to enable unit: svc-a.service does not exist",
                table
            ),
            Some(MappedOutcome::DoesNotExist)
        );
        assert_eq!(find_mapping("Failed to enable unit: busy", table), None);
        assert_eq!(
            find_mapping("Removed /etc/systemd/system/multi-user.target.wants/a.service", table),
            Some(MappedOutcome::Success)
        );
    }

    #[test]
    fn mapped_outcomes_translate_to_results() {
        assert!(matches!(
            MappedOutcome::DoesNotExist.into_result("x"),
            Err(SvcError::ServiceDoesNotExist)
        ));
        assert!(matches!(
            MappedOutcome::ConfigError.into_result("bad plist"),
            Err(SvcError::ServiceConfigError { .. })
        ));
        assert!(MappedOutcome::Success.into_result("ignored").is_ok());
    }

    #[test]
    fn poll_until_stopped_returns_once_not_running() {
        let descriptor = ServiceDescriptor::new("svc-a").unwrap();
        assert!(poll_until_stopped(|| ServiceInfo::new(descriptor.clone())));

        let missing = || {
            let mut info = ServiceInfo::new(descriptor.clone());
            info.is_running = true;
            info.error = Some(SvcError::ServiceDoesNotExist);
            info
        };
        assert!(poll_until_stopped(missing));
    }
}
