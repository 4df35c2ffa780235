//! Clients for the Morpheus management API.
//!
//! [`ClusterApi`] is the seam between the reconciler and the remote system.
//! [`HttpClient`] talks to a real Morpheus appliance; tests substitute a
//! scripted implementation.

pub mod http;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::payload::{AddWorkerRequest, ClusterPatchRequest, CreateClusterRequest};

pub use http::HttpClient;
pub use types::{
    Cluster, ClusterWorker, DeleteClusterOptions, Host, IdRef, Tag, WorkerInterface, WorkerVolume,
};

/// Errors returned by a Morpheus API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// HTTP 404, or a lookup that matched nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP status.
    #[error("API returned {code}: {message}")]
    Status { code: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// HTTP status code, when the API produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::NotFound(_) => Some(404),
            ApiError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Result type for Morpheus API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The Morpheus calls needed to manage an MKS cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn create_cluster(&self, request: &CreateClusterRequest) -> ApiResult<Cluster>;

    async fn get_cluster(&self, id: i64) -> ApiResult<Cluster>;

    async fn find_cluster_by_name(&self, name: &str) -> ApiResult<Cluster>;

    async fn update_cluster(&self, id: i64, request: &ClusterPatchRequest) -> ApiResult<()>;

    async fn delete_cluster(&self, id: i64, options: &DeleteClusterOptions) -> ApiResult<()>;

    async fn list_cluster_workers(&self, cluster_id: i64) -> ApiResult<Vec<ClusterWorker>>;

    async fn add_cluster_worker(&self, cluster_id: i64, request: &AddWorkerRequest)
    -> ApiResult<()>;

    async fn delete_cluster_worker(&self, cluster_id: i64, worker_id: i64) -> ApiResult<()>;

    async fn list_hosts_by_cluster(&self, cluster_id: i64) -> ApiResult<Vec<Host>>;
}
