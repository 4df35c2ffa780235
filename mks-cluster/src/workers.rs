//! Worker node listing and filtering.

use tracing::error;

use crate::clients::{ClusterApi, ClusterWorker};
use crate::error::Result;
use crate::status::Status;

/// List a cluster's workers, oldest first.
///
/// Morpheus names new workers after the existing count, so the creation
/// order is what keeps scale-down from removing the wrong nodes.
pub async fn list_workers(api: &dyn ClusterApi, cluster_id: i64) -> Result<Vec<ClusterWorker>> {
    let mut workers = api.list_cluster_workers(cluster_id).await.map_err(|e| {
        error!(cluster_id, error = %e, "Error listing cluster worker nodes");
        e
    })?;
    sort_by_creation(&mut workers);
    Ok(workers)
}

/// Stable sort by creation time; ties keep the API's order.
pub fn sort_by_creation(workers: &mut [ClusterWorker]) {
    workers.sort_by_key(|w| w.date_created);
}

/// Workers currently in `status`.
pub fn with_status(workers: &[ClusterWorker], status: &Status) -> Vec<ClusterWorker> {
    workers
        .iter()
        .filter(|w| &w.status == status)
        .cloned()
        .collect()
}

/// Workers in any status other than `status`.
pub fn without_status(workers: &[ClusterWorker], status: &Status) -> Vec<ClusterWorker> {
    workers
        .iter()
        .filter(|w| &w.status != status)
        .cloned()
        .collect()
}

pub fn count_with_status(workers: &[ClusterWorker], status: &Status) -> usize {
    workers.iter().filter(|w| &w.status == status).count()
}
