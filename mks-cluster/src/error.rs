//! Reconciler error types.

use std::time::Duration;

use thiserror::Error;

use crate::clients::ApiError;

/// Errors surfaced by a lifecycle operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The Morpheus API rejected a call or could not be reached.
    #[error("remote call failed: {0}")]
    Remote(#[from] ApiError),

    /// A poll loop ran past its timeout without reaching a terminal status.
    #[error("timeout after {timeout:?} waiting for {waiting_for} (last status: {last_status})")]
    ConvergenceTimeout {
        waiting_for: String,
        timeout: Duration,
        last_status: String,
    },

    /// The refresh function of a poll loop failed.
    #[error("error waiting for {waiting_for}: {source}")]
    Convergence {
        waiting_for: String,
        #[source]
        source: Box<Error>,
    },

    /// A status outside both the pending and the terminal set was observed.
    #[error("unexpected status '{status}' while waiting for {waiting_for}")]
    UnexpectedStatus { waiting_for: String, status: String },

    /// At least one worker node reached `failed` during a scale-up.
    #[error("failed to provision all cluster worker nodes ({failed} failed)")]
    WorkerProvisionFailure { failed: usize },

    /// The cluster settled in `failed` and no host explained it.
    #[error("cluster {cluster_id} failed to provision")]
    TerminalFailureState { cluster_id: i64 },

    /// The desired state does not pass validation.
    #[error("invalid desired state: {0}")]
    InvalidDesiredState(String),

    /// An internal invariant does not hold.
    #[error("internal error: {0}")]
    Invariant(String),

    /// Neither an id nor a name is available to locate the cluster.
    #[error("cluster cannot be located without a name or id")]
    MissingIdentity,

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The lifecycle call exceeded its overall deadline.
    #[error("{operation} did not complete within {timeout:?}")]
    OperationTimeout {
        operation: &'static str,
        timeout: Duration,
    },
}

impl Error {
    /// Returns true for a 404 from the Morpheus API.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Remote(e) if e.is_not_found())
    }
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;
