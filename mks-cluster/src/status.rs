//! Status tokens reported by the Morpheus API for clusters, workers and hosts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A remote status value.
///
/// Statuses the reconciler never branches on are kept verbatim in `Other`
/// so they can still be logged and reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Cancelled,
    Denied,
    Deprovisioned,
    Deprovisioning,
    Failed,
    Ok,
    Pending,
    PendingRemoval,
    Provisioning,
    Provisioned,
    Removed,
    Removing,
    Running,
    Starting,
    Stopping,
    Suspended,
    Syncing,
    Warning,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Cancelled => "cancelled",
            Status::Denied => "denied",
            Status::Deprovisioned => "deprovisioned",
            Status::Deprovisioning => "deprovisioning",
            Status::Failed => "failed",
            Status::Ok => "ok",
            Status::Pending => "pending",
            Status::PendingRemoval => "pendingRemoval",
            Status::Provisioning => "provisioning",
            Status::Provisioned => "provisioned",
            Status::Removed => "removed",
            Status::Removing => "removing",
            Status::Running => "running",
            Status::Starting => "starting",
            Status::Stopping => "stopping",
            Status::Suspended => "suspended",
            Status::Syncing => "syncing",
            Status::Warning => "warning",
            Status::Other(s) => s,
        }
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s {
            "cancelled" => Status::Cancelled,
            "denied" => Status::Denied,
            "deprovisioned" => Status::Deprovisioned,
            "deprovisioning" => Status::Deprovisioning,
            "failed" => Status::Failed,
            "ok" => Status::Ok,
            "pending" => Status::Pending,
            "pendingRemoval" => Status::PendingRemoval,
            "provisioning" => Status::Provisioning,
            "provisioned" => Status::Provisioned,
            "removed" => Status::Removed,
            "removing" => Status::Removing,
            "running" => Status::Running,
            "starting" => Status::Starting,
            "stopping" => Status::Stopping,
            "suspended" => Status::Suspended,
            "syncing" => Status::Syncing,
            "warning" => Status::Warning,
            other => Status::Other(other.to_string()),
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        Status::from(s.as_str())
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
