//! Desired state of an MKS cluster and the local record kept between calls.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest worker pool Morpheus accepts for a Kubernetes layout.
pub const MINIMUM_WORKER_NODES: u32 = 3;

pub const DEFAULT_POD_CIDR: &str = "172.20.0.0/16";
pub const DEFAULT_SERVICE_CIDR: &str = "172.30.0.0/16";

fn default_pod_cidr() -> String {
    DEFAULT_POD_CIDR.to_string()
}

fn default_service_cidr() -> String {
    DEFAULT_SERVICE_CIDR.to_string()
}

fn default_worker_count() -> u32 {
    MINIMUM_WORKER_NODES
}

/// Declared configuration of a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Virtual machine name prefix for master and worker nodes.
    #[serde(default)]
    pub resource_prefix: Option<String>,
    /// Guest hostname prefix for master and worker nodes.
    #[serde(default)]
    pub hostname_prefix: Option<String>,
    pub cloud_id: i64,
    pub group_id: i64,
    pub cluster_layout_id: i64,
    #[serde(default)]
    pub api_proxy_id: Option<i64>,
    #[serde(default = "default_pod_cidr")]
    pub pod_cidr: String,
    #[serde(default = "default_service_cidr")]
    pub service_cidr: String,
    #[serde(default)]
    pub cluster_repo_account_id: Option<i64>,
    /// Provisioning workflow (task set) to run.
    #[serde(default)]
    pub workflow_id: Option<i64>,
    pub master_node_pool: MasterNodePool,
    pub worker_node_pool: WorkerNodePool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterNodePool {
    pub plan_id: i64,
    #[serde(default)]
    pub resource_pool_id: Option<i64>,
    #[serde(default)]
    pub storage_volumes: Vec<StorageVolume>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerNodePool {
    #[serde(default = "default_worker_count")]
    pub count: u32,
    pub plan_id: i64,
    #[serde(default)]
    pub resource_pool_id: Option<i64>,
    #[serde(default)]
    pub storage_volumes: Vec<StorageVolume>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageVolume {
    /// Assigned by Morpheus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub root: bool,
    pub name: String,
    /// Size in GB.
    pub size: u64,
    /// Required when declared; unset when Morpheus did not report it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub network_id: i64,
}

impl ClusterSpec {
    /// Check the constraints Morpheus would otherwise reject late.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidDesiredState("name must not be empty".into()));
        }
        let count = self.worker_node_pool.count;
        if count < MINIMUM_WORKER_NODES {
            return Err(Error::InvalidDesiredState(format!(
                "count must be a minimum of {}, count is {}",
                MINIMUM_WORKER_NODES, count
            )));
        }
        validate_cidr("pod_cidr", &self.pod_cidr)?;
        validate_cidr("service_cidr", &self.service_cidr)?;
        validate_volumes("master_node_pool", &self.master_node_pool.storage_volumes)?;
        validate_volumes("worker_node_pool", &self.worker_node_pool.storage_volumes)?;
        Ok(())
    }
}

fn validate_volumes(pool: &str, volumes: &[StorageVolume]) -> Result<()> {
    for volume in volumes {
        if volume.storage_type.is_none() || volume.datastore_id.is_none() {
            return Err(Error::InvalidDesiredState(format!(
                "{} volume {} needs storage_type and datastore_id",
                pool, volume.name
            )));
        }
    }
    Ok(())
}

fn validate_cidr(field: &str, value: &str) -> Result<()> {
    let invalid = || Error::InvalidDesiredState(format!("{} is not a valid CIDR: {}", field, value));
    let (addr, prefix) = value.split_once('/').ok_or_else(invalid)?;
    let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(invalid());
    }
    Ok(())
}

/// Local record of a managed cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    /// Morpheus cluster id. `None` until created, or once the cluster is gone.
    #[serde(default)]
    pub id: Option<i64>,
    pub spec: ClusterSpec,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub kubernetes_version: Option<String>,
}

impl ClusterState {
    pub fn new(spec: ClusterSpec) -> Self {
        Self {
            id: None,
            spec,
            api_endpoint: None,
            kubernetes_version: None,
        }
    }

    /// Adopt an existing cluster by id; the next read fills in the rest.
    pub fn import(id: i64) -> Self {
        Self {
            id: Some(id),
            spec: ClusterSpec {
                name: String::new(),
                description: None,
                resource_prefix: None,
                hostname_prefix: None,
                cloud_id: 0,
                group_id: 0,
                cluster_layout_id: 0,
                api_proxy_id: None,
                pod_cidr: default_pod_cidr(),
                service_cidr: default_service_cidr(),
                cluster_repo_account_id: None,
                workflow_id: None,
                master_node_pool: MasterNodePool {
                    plan_id: 0,
                    resource_pool_id: None,
                    storage_volumes: Vec::new(),
                    network_interfaces: Vec::new(),
                    tags: BTreeMap::new(),
                },
                worker_node_pool: WorkerNodePool {
                    count: MINIMUM_WORKER_NODES,
                    plan_id: 0,
                    resource_pool_id: None,
                    storage_volumes: Vec::new(),
                    network_interfaces: Vec::new(),
                    tags: BTreeMap::new(),
                },
            },
            api_endpoint: None,
            kubernetes_version: None,
        }
    }
}
