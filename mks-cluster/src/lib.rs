//! mks-cluster: provisions, reads, scales and removes a Morpheus Kubernetes
//! Service (MKS) cluster on vSphere.
//!
//! The [`MksClusterReconciler`] maps a declared [`ClusterSpec`] onto the
//! Morpheus API and waits for the remote status to settle after each
//! asynchronous call.

pub mod clients;
pub mod cluster;
pub mod config;
pub mod error;
pub mod payload;
pub mod poller;
pub mod reconciler;
pub mod status;
pub mod workers;

pub use clients::{ApiError, ClusterApi, HttpClient};
pub use cluster::{ClusterSpec, ClusterState};
pub use config::{OperationTimeouts, PollTimings, ReconcilerConfig};
pub use error::{Error, Result};
pub use reconciler::{MksClusterReconciler, Reconciler};
pub use status::Status;
