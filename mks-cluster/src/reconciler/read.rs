//! Cluster read.

use tracing::{debug, warn};

use super::{MksClusterReconciler, api_failure};
use crate::cluster::ClusterState;
use crate::error::{Error, Result};
use crate::payload;
use crate::status::Status;
use crate::workers;

impl MksClusterReconciler {
    pub(super) async fn read_cluster(&self, state: &mut ClusterState) -> Result<()> {
        let lookup = match state.id {
            Some(id) => self.api.get_cluster(id).await,
            None if !state.spec.name.is_empty() => {
                self.api.find_cluster_by_name(&state.spec.name).await
            }
            None => return Err(Error::MissingIdentity),
        };

        let cluster = match lookup {
            Ok(cluster) => cluster,
            Err(e) if e.is_not_found() => {
                warn!(id = ?state.id, error = %e, "API 404 - forcing recreation of cluster");
                state.id = None;
                return Ok(());
            }
            Err(e) => return Err(api_failure("reading cluster")(e)),
        };

        let listed = workers::list_workers(self.api.as_ref(), cluster.id).await?;
        let active = workers::without_status(&listed, &Status::Deprovisioning);
        let observed = payload::observe(&cluster, &active)?;
        debug!(
            cluster_id = cluster.id,
            workers = active.len(),
            status = %cluster.status,
            "Cluster read"
        );
        observed.apply_to(state);
        Ok(())
    }
}
