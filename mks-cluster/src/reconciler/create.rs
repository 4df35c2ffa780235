//! Cluster create.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::flaky::{self, ProvisioningObservation};
use super::{MksClusterReconciler, api_failure};
use crate::clients::ApiError;
use crate::cluster::ClusterState;
use crate::error::{Error, Result};
use crate::payload;
use crate::poller::Convergence;
use crate::status::Status;

const PENDING: [Status; 5] = [
    Status::Provisioning,
    Status::Starting,
    Status::Stopping,
    Status::Pending,
    Status::Syncing,
];

const TARGET: [Status; 7] = [
    Status::Running,
    Status::Failed,
    Status::Warning,
    Status::Denied,
    Status::Cancelled,
    Status::Suspended,
    Status::Ok,
];

impl MksClusterReconciler {
    pub(super) async fn create_cluster(
        &self,
        state: &mut ClusterState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        state.spec.validate()?;

        let request = payload::create_cluster_request(&state.spec);
        let cluster = self
            .api
            .create_cluster(&request)
            .await
            .map_err(api_failure("creating cluster"))?;
        let cluster_id = cluster.id;
        state.id = Some(cluster_id);
        info!(cluster_id, name = %cluster.name, "Cluster create submitted");

        let api = self.api.as_ref();
        let grace = self.config.failed_status_grace;
        let wait = Convergence::new(
            format!("cluster {} to provision", cluster_id),
            PENDING,
            TARGET,
            self.config.create_poll,
        );
        let last: ProvisioningObservation = wait
            .wait(cancel, move || async move {
                let observation =
                    flaky::observe_provisioning(api, cluster_id, grace, cancel).await?;
                let status = observation.poll_status();
                Ok((observation, status))
            })
            .await
            .map_err(|e| {
                error!(cluster_id, error = %e, "Error creating cluster");
                e
            })?;

        let read_back = self.read_cluster(state).await;

        if last.is_flaky_failure() {
            if let Err(e) = read_back {
                warn!(cluster_id, error = %e, "Could not read back failed cluster");
            }
            error!(cluster_id, "Cluster stayed failed after the grace period");
            return Err(Error::TerminalFailureState { cluster_id });
        }
        read_back?;
        if state.id.is_none() {
            error!(cluster_id, "Cluster vanished right after it was created");
            return Err(Error::Remote(ApiError::NotFound(format!(
                "cluster {} not found after create",
                cluster_id
            ))));
        }
        if last.cluster.status != Status::Running && last.cluster.status != Status::Ok {
            warn!(cluster_id, status = %last.cluster.status, "Cluster settled in a degraded status");
        }
        info!(cluster_id, status = %last.cluster.status, "Cluster created");
        Ok(())
    }
}
