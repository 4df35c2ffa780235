//! Cluster delete.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::MksClusterReconciler;
use crate::clients::DeleteClusterOptions;
use crate::cluster::ClusterState;
use crate::error::{Error, Result};
use crate::poller::Convergence;
use crate::status::Status;

const PENDING: [Status; 6] = [
    Status::Removing,
    Status::PendingRemoval,
    Status::Stopping,
    Status::Pending,
    Status::Warning,
    Status::Deprovisioning,
];

impl MksClusterReconciler {
    pub(super) async fn delete_cluster(
        &self,
        state: &mut ClusterState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cluster_id = state.id.ok_or(Error::MissingIdentity)?;
        let options = DeleteClusterOptions {
            remove_instances: true,
            remove_resources: true,
            force: self.config.force_delete,
        };

        // A 404 here is an error: the cluster was expected to exist.
        self.api
            .delete_cluster(cluster_id, &options)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    warn!(cluster_id, error = %e, "API 404 deleting cluster");
                } else {
                    error!(cluster_id, error = %e, "API FAILURE deleting cluster");
                }
                Error::Remote(e)
            })?;
        info!(cluster_id, force = options.force, "Cluster delete submitted");

        let api = self.api.as_ref();
        let wait = Convergence::new(
            format!("cluster {} to be removed", cluster_id),
            PENDING,
            [Status::Removed],
            self.config.delete_poll,
        );
        wait.wait(cancel, move || async move {
            match api.get_cluster(cluster_id).await {
                Ok(cluster) => Ok(((), cluster.status)),
                // Gone while polling means removed.
                Err(e) if e.is_not_found() => Ok(((), Status::Removed)),
                Err(e) => Err(Error::Remote(e)),
            }
        })
        .await
        .map_err(|e| {
            error!(cluster_id, error = %e, "Error deleting cluster");
            e
        })?;

        info!(cluster_id, "Cluster removed");
        state.id = None;
        Ok(())
    }
}
