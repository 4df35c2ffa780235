//! Cluster update: worker scaling and metadata changes.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{MksClusterReconciler, api_failure};
use crate::cluster::{ClusterSpec, ClusterState};
use crate::error::{Error, Result};
use crate::payload;
use crate::poller::Convergence;
use crate::status::Status;
use crate::workers;

impl MksClusterReconciler {
    pub(super) async fn update_cluster(
        &self,
        prior: &ClusterSpec,
        state: &mut ClusterState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cluster_id = state.id.ok_or(Error::MissingIdentity)?;
        state.spec.validate()?;

        let mut changed = false;

        let old_count = i64::from(prior.worker_node_pool.count);
        let new_count = i64::from(state.spec.worker_node_pool.count);
        let delta = new_count - old_count;
        if delta > 0 {
            let add = u32::try_from(delta)
                .map_err(|_| Error::Invariant(format!("worker delta {} out of range", delta)))?;
            self.add_workers(cluster_id, &state.spec, add, cancel)
                .await
                .map_err(|e| {
                    error!(cluster_id, error = %e, "Error adding cluster worker node(s)");
                    e
                })?;
            changed = true;
        } else if delta < 0 {
            let remove = usize::try_from(delta.unsigned_abs())
                .map_err(|_| Error::Invariant(format!("worker delta {} out of range", delta)))?;
            self.remove_workers(cluster_id, remove, cancel)
                .await
                .map_err(|e| {
                    error!(cluster_id, error = %e, "Error deleting cluster worker node(s)");
                    e
                })?;
            changed = true;
        }

        if let Some(patch) = payload::cluster_patch(prior, &state.spec) {
            self.api
                .update_cluster(cluster_id, &patch)
                .await
                .map_err(api_failure("updating cluster"))?;
            info!(cluster_id, "Cluster metadata updated");
            changed = true;
        }

        if !changed {
            debug!(cluster_id, "Nothing to update");
            return Ok(());
        }
        self.read_cluster(state).await
    }

    /// Add `count` workers shaped like the oldest live one and wait until
    /// all of them are provisioned.
    async fn add_workers(
        &self,
        cluster_id: i64,
        spec: &ClusterSpec,
        count: u32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let api = self.api.as_ref();
        let listed = workers::list_workers(api, cluster_id).await?;
        let active = workers::without_status(&listed, &Status::Deprovisioning);
        let template = active.first().ok_or_else(|| {
            Error::Invariant(format!(
                "cluster {} has no worker to copy the server type from",
                cluster_id
            ))
        })?;
        let desired = active.len() + count as usize;

        let request = payload::add_worker_request(spec, template, count);
        api.add_cluster_worker(cluster_id, &request)
            .await
            .map_err(api_failure("creating cluster worker node(s)"))?;
        info!(cluster_id, count, desired, "Cluster worker add submitted");

        let wait = Convergence::new(
            format!("{} cluster worker nodes to be provisioned", desired),
            [Status::Provisioning],
            [Status::Provisioned],
            self.config.scale_poll,
        );
        wait.wait(cancel, move || async move {
            let current = workers::list_workers(api, cluster_id).await?;
            let failed = workers::count_with_status(&current, &Status::Failed);
            if failed > 0 {
                return Err(Error::WorkerProvisionFailure { failed });
            }
            if workers::count_with_status(&current, &Status::Provisioned) == desired {
                Ok(((), Status::Provisioned))
            } else {
                Ok(((), Status::Provisioning))
            }
        })
        .await
    }

    /// Remove the `count` newest live workers and wait until none is left
    /// deprovisioning.
    async fn remove_workers(
        &self,
        cluster_id: i64,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let api = self.api.as_ref();
        let listed = workers::list_workers(api, cluster_id).await?;
        let active = workers::without_status(&listed, &Status::Deprovisioning);
        if count > active.len() {
            return Err(Error::Invariant(format!(
                "cannot remove {} of {} worker nodes",
                count,
                active.len()
            )));
        }

        for worker in &active[active.len() - count..] {
            api.delete_cluster_worker(cluster_id, worker.id)
                .await
                .map_err(api_failure("deleting cluster worker node"))?;
            info!(cluster_id, worker_id = worker.id, name = %worker.name, "Cluster worker delete submitted");
        }

        let wait = Convergence::new(
            "cluster worker nodes to be deprovisioned",
            [Status::Deprovisioning],
            [Status::Deprovisioned],
            self.config.scale_poll,
        );
        wait.wait(cancel, move || async move {
            let current = workers::list_workers(api, cluster_id).await?;
            if workers::count_with_status(&current, &Status::Deprovisioning) == 0 {
                Ok(((), Status::Deprovisioned))
            } else {
                Ok(((), Status::Deprovisioning))
            }
        })
        .await
    }
}
