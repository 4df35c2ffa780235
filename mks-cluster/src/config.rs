//! Reconciler configuration.
//!
//! Everything here is fixed when the reconciler is constructed. The defaults
//! match what the Morpheus API needs in practice; tests shrink the poll
//! timings to milliseconds.

use std::time::Duration;

/// Timing parameters for one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimings {
    /// Give up after this long, measured from the start of the wait.
    pub timeout: Duration,
    /// Lower bound for the pause between two refreshes.
    pub min_timeout: Duration,
    /// Pause before the first refresh.
    pub delay: Duration,
    /// Pause between refreshes.
    pub poll_interval: Duration,
}

impl PollTimings {
    /// Pause between two refreshes, never shorter than `min_timeout`.
    pub fn interval(&self) -> Duration {
        self.poll_interval.max(self.min_timeout)
    }
}

/// Overall ceilings for each lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(45 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(45 * 60),
            delete: Duration::from_secs(45 * 60),
        }
    }
}

/// Configuration threaded through [`crate::MksClusterReconciler::new`].
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Ask the API to force the cluster removal.
    pub force_delete: bool,
    pub timeouts: OperationTimeouts,
    /// Waiting for a new cluster to leave `provisioning`.
    pub create_poll: PollTimings,
    /// Waiting for workers to be added or removed.
    pub scale_poll: PollTimings,
    /// Waiting for a deleted cluster to disappear.
    pub delete_poll: PollTimings,
    /// How long a `failed` cluster is given before the poll loop lets go.
    pub failed_status_grace: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            force_delete: false,
            timeouts: OperationTimeouts::default(),
            create_poll: PollTimings {
                timeout: Duration::from_secs(3 * 60 * 60),
                min_timeout: Duration::from_secs(60),
                delay: Duration::from_secs(3 * 60),
                poll_interval: Duration::from_secs(60),
            },
            scale_poll: PollTimings {
                timeout: Duration::from_secs(30 * 60),
                min_timeout: Duration::from_secs(60),
                delay: Duration::from_secs(60),
                poll_interval: Duration::from_secs(10),
            },
            delete_poll: PollTimings {
                timeout: Duration::from_secs(30 * 60),
                min_timeout: Duration::from_secs(60),
                delay: Duration::from_secs(60),
                poll_interval: Duration::from_secs(30),
            },
            failed_status_grace: Duration::from_secs(3 * 60),
        }
    }
}

impl ReconcilerConfig {
    pub fn with_force_delete(mut self, force: bool) -> Self {
        self.force_delete = force;
        self
    }
}
