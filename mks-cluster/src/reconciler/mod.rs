//! Lifecycle reconciler for MKS clusters.
//!
//! Each operation runs to completion before the next one starts. The only
//! places an operation suspends are the poll loops, which watch the
//! caller's cancellation token.

mod create;
mod delete;
pub mod flaky;
mod read;
mod update;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::clients::{ApiError, ClusterApi};
use crate::cluster::{ClusterSpec, ClusterState};
use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};

/// Trait for declarative resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// The declared configuration.
    type Spec;
    /// The local record kept between operations.
    type State;

    /// Create the resource. The remote id is recorded in `state` as soon as
    /// it is known, even if the operation later fails.
    async fn create(&self, state: &mut Self::State, cancel: &CancellationToken) -> Result<()>;

    /// Refresh `state` from the remote system. A resource that no longer
    /// exists leaves `state` without an id.
    async fn read(&self, state: &mut Self::State, cancel: &CancellationToken) -> Result<()>;

    /// Move the remote resource from `prior` to the desired state in `state`.
    async fn update(
        &self,
        prior: &Self::Spec,
        state: &mut Self::State,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Remove the resource and clear the id in `state`.
    async fn delete(&self, state: &mut Self::State, cancel: &CancellationToken) -> Result<()>;
}

/// Reconciler for a Morpheus Kubernetes Service cluster on vSphere.
pub struct MksClusterReconciler {
    api: Arc<dyn ClusterApi>,
    config: ReconcilerConfig,
}

impl MksClusterReconciler {
    pub fn new(api: Arc<dyn ClusterApi>, config: ReconcilerConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Update the cluster in `state` to `desired`.
    ///
    /// On failure `state` keeps the spec it had before, so the next attempt
    /// computes the same change again.
    pub async fn apply_desired(
        &self,
        desired: ClusterSpec,
        state: &mut ClusterState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let prior = std::mem::replace(&mut state.spec, desired);
        let res = self.update(&prior, state, cancel).await;
        if let Err(e) = &res {
            warn!(id = ?state.id, error = %e, "Update failed, keeping the previous desired state");
            state.spec = prior;
        }
        res
    }

    /// Run `op` under the operation deadline and the caller's cancellation.
    async fn bounded<T, F>(
        &self,
        operation: &'static str,
        limit: Duration,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = tokio::time::timeout(limit, op) => match res {
                Ok(res) => res,
                Err(_) => {
                    error!(operation, timeout = ?limit, "Operation deadline exceeded");
                    Err(Error::OperationTimeout { operation, timeout: limit })
                }
            },
        }
    }
}

/// Log a failed API call before handing the error on.
fn api_failure(what: &'static str) -> impl Fn(ApiError) -> Error {
    move |e| {
        error!(error = %e, "API FAILURE - {}", what);
        Error::Remote(e)
    }
}

#[async_trait]
impl Reconciler for MksClusterReconciler {
    type Spec = ClusterSpec;
    type State = ClusterState;

    async fn create(&self, state: &mut ClusterState, cancel: &CancellationToken) -> Result<()> {
        let limit = self.config.timeouts.create;
        self.bounded("create", limit, cancel, self.create_cluster(state, cancel))
            .await
    }

    async fn read(&self, state: &mut ClusterState, cancel: &CancellationToken) -> Result<()> {
        let limit = self.config.timeouts.read;
        self.bounded("read", limit, cancel, self.read_cluster(state))
            .await
    }

    async fn update(
        &self,
        prior: &ClusterSpec,
        state: &mut ClusterState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let limit = self.config.timeouts.update;
        self.bounded(
            "update",
            limit,
            cancel,
            self.update_cluster(prior, state, cancel),
        )
        .await
    }

    async fn delete(&self, state: &mut ClusterState, cancel: &CancellationToken) -> Result<()> {
        let limit = self.config.timeouts.delete;
        self.bounded("delete", limit, cancel, self.delete_cluster(state, cancel))
            .await
    }
}
