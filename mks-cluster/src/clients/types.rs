//! Records returned by the Morpheus API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::Status;

/// `{"id": …}` reference to another Morpheus object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: i64,
}

impl IdRef {
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}

/// A cluster as held by Morpheus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "provisioning")]
    pub status: Status,
    /// Cloud.
    #[serde(default)]
    pub zone: Option<IdRef>,
    /// Group.
    #[serde(default)]
    pub site: Option<IdRef>,
    #[serde(default)]
    pub layout: Option<IdRef>,
    #[serde(default)]
    pub service_version: Option<String>,
    #[serde(default)]
    pub service_url: Option<String>,
}

fn provisioning() -> Status {
    Status::Provisioning
}

/// One worker node of a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterWorker {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub status: Status,
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub plan: Option<IdRef>,
    #[serde(default)]
    pub resource_pool_id: Option<i64>,
    #[serde(default)]
    pub compute_server_type: Option<IdRef>,
    #[serde(default)]
    pub volumes: Vec<WorkerVolume>,
    #[serde(default)]
    pub interfaces: Vec<WorkerInterface>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerVolume {
    #[serde(default)]
    pub uuid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub root_volume: bool,
    /// Size in bytes.
    #[serde(default)]
    pub max_storage: u64,
    #[serde(default)]
    pub datastore_id: Option<i64>,
    #[serde(default)]
    pub type_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerInterface {
    #[serde(default)]
    pub network: Option<IdRef>,
}

/// Name/value tag, the wire form of a tag map entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

/// A compute host (server) that belongs to a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub status: Status,
}

/// Query flags for a cluster removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteClusterOptions {
    pub remove_instances: bool,
    pub remove_resources: bool,
    pub force: bool,
}

impl DeleteClusterOptions {
    pub fn query(&self) -> Vec<(&'static str, &'static str)> {
        let mut q = Vec::new();
        if self.remove_instances {
            q.push(("removeInstances", "on"));
        }
        if self.remove_resources {
            q.push(("removeResources", "on"));
        }
        if self.force {
            q.push(("force", "true"));
        }
        q
    }
}
