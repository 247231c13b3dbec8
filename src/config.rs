//! Tunables for a nuke run

use std::time::Duration;

/// Default interval between convergence checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on the convergence wait
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings shared by every target of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NukeConfig {
    /// Time between two CRD existence checks
    pub poll_interval: Duration,
    /// Total time to wait for the CRD to disappear before warning
    pub timeout: Duration,
    /// Treat NotFound on namespace and object list calls as "nothing to sweep"
    pub tolerate_list_not_found: bool,
}

impl Default for NukeConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            tolerate_list_not_found: true,
        }
    }
}

impl NukeConfig {
    /// Set the convergence poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the convergence timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fail targets whose list calls return NotFound
    pub fn strict_list(mut self) -> Self {
        self.tolerate_list_not_found = false;
        self
    }
}
