//! Compatibility shim for the premature `failed` cluster status.
//!
//! Morpheus appliances before 8.0.4 can flag a new cluster `failed` while
//! its hosts are still being provisioned, and can flap through `failed`
//! before settling. This module decides what a `failed` observation during
//! create really means. It is not part of the core state machine and can be
//! removed once older appliances are no longer supported.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clients::{Cluster, ClusterApi};
use crate::error::{Error, Result};
use crate::status::Status;

/// How a provisioning observation is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningState {
    /// The reported status stands as is.
    Reported(Status),
    /// `failed` was reported but hosts are still provisioning.
    HostsStillProvisioning,
    /// `failed` with no host to explain it, after the grace period.
    ProvisioningFlakyFailure,
}

/// One refresh of a cluster being created.
#[derive(Debug, Clone)]
pub struct ProvisioningObservation {
    pub cluster: Cluster,
    pub state: ProvisioningState,
}

impl ProvisioningObservation {
    /// Status handed to the poll loop.
    ///
    /// A flaky failure is reported as `ok` so the loop stops waiting; the
    /// caller still fails the create afterwards.
    pub fn poll_status(&self) -> Status {
        match &self.state {
            ProvisioningState::Reported(status) => status.clone(),
            ProvisioningState::HostsStillProvisioning => Status::Provisioning,
            ProvisioningState::ProvisioningFlakyFailure => Status::Ok,
        }
    }

    pub fn is_flaky_failure(&self) -> bool {
        self.state == ProvisioningState::ProvisioningFlakyFailure
    }
}

/// Fetch the cluster and classify its status.
pub async fn observe_provisioning(
    api: &dyn ClusterApi,
    cluster_id: i64,
    grace: Duration,
    cancel: &CancellationToken,
) -> Result<ProvisioningObservation> {
    let cluster = api.get_cluster(cluster_id).await?;
    let state = if cluster.status == Status::Failed {
        classify_failed(api, cluster_id, grace, cancel).await?
    } else {
        ProvisioningState::Reported(cluster.status.clone())
    };
    Ok(ProvisioningObservation { cluster, state })
}

/// Decide what a `failed` cluster status means.
///
/// If any host of the cluster is still provisioning the failure is
/// premature. Otherwise wait out `grace` and report a flaky failure.
pub async fn classify_failed(
    api: &dyn ClusterApi,
    cluster_id: i64,
    grace: Duration,
    cancel: &CancellationToken,
) -> Result<ProvisioningState> {
    let hosts = api.list_hosts_by_cluster(cluster_id).await?;
    if hosts.iter().any(|h| h.status == Status::Provisioning) {
        info!(cluster_id, "Cluster reported failed while hosts are still provisioning");
        return Ok(ProvisioningState::HostsStillProvisioning);
    }

    warn!(
        cluster_id,
        grace = ?grace,
        "Cluster reported failed, waiting before giving up on it"
    );
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(grace) => Ok(ProvisioningState::ProvisioningFlakyFailure),
    }
}
