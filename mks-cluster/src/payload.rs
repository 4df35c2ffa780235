//! Translation between the desired state and Morpheus wire payloads.
//!
//! Morpheus is not consistent about how a network is referenced: the master
//! pool and the add-worker endpoint take `"network-<id>"`, the worker pool of
//! a cluster create takes the bare numeric id. [`NetworkEncoding`] selects
//! the shape per call site.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::clients::{Cluster, ClusterWorker, IdRef, Tag};
use crate::cluster::{
    ClusterSpec, ClusterState, NetworkInterface, StorageVolume, WorkerNodePool,
};
use crate::error::{Error, Result};

const CLUSTER_TYPE: &str = "kubernetes-cluster";
const BYTES_PER_GB: u64 = 1 << 30;

// =============================================================================
// Shared pieces
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumePayload {
    pub root_volume: bool,
    pub name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datastore_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NetworkId {
    Prefixed(String),
    Bare(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkRef {
    pub id: NetworkId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInterfacePayload {
    pub network: NetworkRef,
}

/// Where a network interface list is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEncoding {
    /// Master pool of a cluster create: `"network-<id>"`.
    MasterPool,
    /// Worker pool of a cluster create: bare numeric id.
    WorkerPool,
    /// Add-worker call: `"network-<id>"`.
    AddWorker,
}

pub fn encode_network_interfaces(
    interfaces: &[NetworkInterface],
    encoding: NetworkEncoding,
) -> Vec<NetworkInterfacePayload> {
    interfaces
        .iter()
        .map(|iface| {
            let id = match encoding {
                NetworkEncoding::MasterPool | NetworkEncoding::AddWorker => {
                    NetworkId::Prefixed(format!("network-{}", iface.network_id))
                }
                NetworkEncoding::WorkerPool => NetworkId::Bare(iface.network_id),
            };
            NetworkInterfacePayload {
                network: NetworkRef { id },
            }
        })
        .collect()
}

pub fn encode_volumes(volumes: &[StorageVolume]) -> Vec<VolumePayload> {
    volumes
        .iter()
        .map(|v| VolumePayload {
            root_volume: v.root,
            name: v.name.clone(),
            size: v.size,
            storage_type: v.storage_type,
            datastore_id: v.datastore_id,
        })
        .collect()
}

/// Tags go out as `{name, value}` records ordered by name.
pub fn encode_tags(tags: &BTreeMap<String, String>) -> Vec<Tag> {
    tags.iter()
        .map(|(name, value)| Tag {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

fn optional_tags(tags: &BTreeMap<String, String>) -> Option<Vec<Tag>> {
    (!tags.is_empty()).then(|| encode_tags(tags))
}

// =============================================================================
// Cluster create
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateClusterRequest {
    pub cluster: ClusterPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub cluster_type: String,
    pub auto_recover_power_state: bool,
    pub cloud: IdRef,
    pub group: IdRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub layout: IdRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_set_id: Option<i64>,
    pub server: MasterServerPayload,
    pub worker: WorkerPoolPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterServerPayload {
    pub config: MasterConfig,
    pub node_count: u32,
    pub volumes: Vec<VolumePayload>,
    pub network_interfaces: Vec<NetworkInterfacePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    pub plan: IdRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_proxy: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterConfig {
    pub pod_cidr: String,
    pub service_cidr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_pool_id: Option<i64>,
    pub node_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_repo_account: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPoolPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_proxy: Option<IdRef>,
    pub volumes: Vec<VolumePayload>,
    pub network_interfaces: Vec<NetworkInterfacePayload>,
    pub config: WorkerPoolConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    pub server: WorkerServer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPoolConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_pool_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerServer {
    pub plan: IdRef,
}

pub fn create_cluster_request(spec: &ClusterSpec) -> CreateClusterRequest {
    let master = &spec.master_node_pool;
    let worker = &spec.worker_node_pool;
    let api_proxy = spec.api_proxy_id.map(IdRef::new);

    let server = MasterServerPayload {
        config: MasterConfig {
            pod_cidr: spec.pod_cidr.clone(),
            service_cidr: spec.service_cidr.clone(),
            resource_pool_id: master.resource_pool_id,
            node_count: worker.count,
            default_repo_account: spec.cluster_repo_account_id,
        },
        node_count: worker.count,
        volumes: encode_volumes(&master.storage_volumes),
        network_interfaces: encode_network_interfaces(
            &master.network_interfaces,
            NetworkEncoding::MasterPool,
        ),
        tags: optional_tags(&master.tags),
        plan: IdRef::new(master.plan_id),
        api_proxy,
        hostname: spec.hostname_prefix.clone(),
        name: spec.resource_prefix.clone(),
    };

    let worker_pool = WorkerPoolPayload {
        api_proxy,
        volumes: encode_volumes(&worker.storage_volumes),
        network_interfaces: encode_network_interfaces(
            &worker.network_interfaces,
            NetworkEncoding::WorkerPool,
        ),
        config: WorkerPoolConfig {
            resource_pool_id: worker.resource_pool_id,
        },
        tags: optional_tags(&worker.tags),
        server: WorkerServer {
            plan: IdRef::new(worker.plan_id),
        },
    };

    CreateClusterRequest {
        cluster: ClusterPayload {
            name: spec.name.clone(),
            cluster_type: CLUSTER_TYPE.to_string(),
            auto_recover_power_state: false,
            cloud: IdRef::new(spec.cloud_id),
            group: IdRef::new(spec.group_id),
            description: spec.description.clone(),
            layout: IdRef::new(spec.cluster_layout_id),
            task_set_id: spec.workflow_id,
            server,
            worker: worker_pool,
        },
    }
}

// =============================================================================
// Cluster metadata update
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterPatchRequest {
    pub cluster: ClusterPatch,
}

/// Only the fields present are changed remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Build a patch with the metadata fields that differ, or `None`.
pub fn cluster_patch(prior: &ClusterSpec, desired: &ClusterSpec) -> Option<ClusterPatchRequest> {
    let mut patch = ClusterPatch::default();
    if prior.name != desired.name {
        patch.name = Some(desired.name.clone());
    }
    if prior.description != desired.description {
        patch.description = Some(desired.description.clone().unwrap_or_default());
    }
    if patch == ClusterPatch::default() {
        None
    } else {
        Some(ClusterPatchRequest { cluster: patch })
    }
}

// =============================================================================
// Add worker
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddWorkerRequest {
    pub server: AddWorkerServer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWorkerServer {
    pub config: AddWorkerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_type: Option<IdRef>,
    pub cloud: IdRef,
    pub plan: IdRef,
    pub volumes: Vec<VolumePayload>,
    pub network_interfaces: Vec<NetworkInterfacePayload>,
    pub node_count: u32,
    pub tags: Vec<Tag>,
    /// Empty network block still required by appliances before 8.0.5.
    pub server: LegacyServerBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWorkerConfig {
    pub pod_cidr: String,
    pub service_cidr: String,
    pub node_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_pool_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_repo_account: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LegacyServerBlock {
    pub network: serde_json::Map<String, serde_json::Value>,
}

/// Payload adding `node_count` workers shaped like `template`.
pub fn add_worker_request(
    spec: &ClusterSpec,
    template: &ClusterWorker,
    node_count: u32,
) -> AddWorkerRequest {
    let pool = &spec.worker_node_pool;
    AddWorkerRequest {
        server: AddWorkerServer {
            config: AddWorkerConfig {
                pod_cidr: spec.pod_cidr.clone(),
                service_cidr: spec.service_cidr.clone(),
                node_count: pool.count,
                resource_pool_id: pool.resource_pool_id,
                default_repo_account: spec.cluster_repo_account_id,
            },
            server_type: template.compute_server_type,
            cloud: IdRef::new(spec.cloud_id),
            plan: IdRef::new(pool.plan_id),
            volumes: encode_volumes(&pool.storage_volumes),
            network_interfaces: encode_network_interfaces(
                &pool.network_interfaces,
                NetworkEncoding::AddWorker,
            ),
            node_count,
            tags: encode_tags(&pool.tags),
            server: LegacyServerBlock::default(),
        },
    }
}

// =============================================================================
// Read-back
// =============================================================================

/// The part of the desired state that can be recovered from Morpheus.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedCluster {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub cloud_id: Option<i64>,
    pub group_id: Option<i64>,
    pub cluster_layout_id: Option<i64>,
    pub kubernetes_version: Option<String>,
    pub api_endpoint: Option<String>,
    pub worker_node_pool: WorkerNodePool,
}

pub fn bytes_to_gb(bytes: u64) -> u64 {
    bytes / BYTES_PER_GB
}

/// Project a cluster and its live workers onto the desired-state shape.
///
/// `workers` must already exclude deprovisioning nodes and be ordered by
/// creation; the first one is the template for the pool settings.
pub fn observe(cluster: &Cluster, workers: &[ClusterWorker]) -> Result<ObservedCluster> {
    let template = workers.first().ok_or_else(|| {
        Error::Invariant(format!("cluster {} has no active worker nodes", cluster.id))
    })?;

    let storage_volumes = template
        .volumes
        .iter()
        .map(|v| StorageVolume {
            uuid: v.uuid.clone(),
            root: v.root_volume,
            name: v.name.clone(),
            size: bytes_to_gb(v.max_storage),
            storage_type: v.type_id,
            datastore_id: v.datastore_id,
        })
        .collect();

    let network_interfaces = template
        .interfaces
        .iter()
        .filter_map(|i| i.network)
        .map(|n| NetworkInterface { network_id: n.id })
        .collect();

    let tags = template
        .tags
        .iter()
        .map(|t| (t.name.clone(), t.value.clone()))
        .collect();

    let count = u32::try_from(workers.len())
        .map_err(|_| Error::Invariant("worker count overflows u32".into()))?;

    Ok(ObservedCluster {
        id: cluster.id,
        name: cluster.name.clone(),
        description: cluster.description.clone(),
        cloud_id: cluster.zone.map(|z| z.id),
        group_id: cluster.site.map(|s| s.id),
        cluster_layout_id: cluster.layout.map(|l| l.id),
        kubernetes_version: cluster.service_version.clone(),
        api_endpoint: cluster.service_url.clone(),
        worker_node_pool: WorkerNodePool {
            count,
            plan_id: template.plan.map(|p| p.id).unwrap_or_default(),
            resource_pool_id: template.resource_pool_id,
            storage_volumes,
            network_interfaces,
            tags,
        },
    })
}

impl ObservedCluster {
    /// Overwrite the readable fields of `state`.
    pub fn apply_to(self, state: &mut ClusterState) {
        state.id = Some(self.id);
        state.spec.name = self.name;
        state.spec.description = self.description;
        if let Some(id) = self.cloud_id {
            state.spec.cloud_id = id;
        }
        if let Some(id) = self.group_id {
            state.spec.group_id = id;
        }
        if let Some(id) = self.cluster_layout_id {
            state.spec.cluster_layout_id = id;
        }
        state.kubernetes_version = self.kubernetes_version;
        state.api_endpoint = self.api_endpoint;
        let declared = std::mem::take(&mut state.spec.worker_node_pool.storage_volumes);
        state.spec.worker_node_pool = self.worker_node_pool;
        for volume in &mut state.spec.worker_node_pool.storage_volumes {
            let Some(known) = declared.iter().find(|d| d.name == volume.name) else {
                continue;
            };
            volume.storage_type = volume.storage_type.or(known.storage_type);
            volume.datastore_id = volume.datastore_id.or(known.datastore_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{WorkerInterface, WorkerVolume};
    use crate::cluster::{MasterNodePool, WorkerNodePool};
    use crate::status::Status;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn spec() -> ClusterSpec {
        ClusterSpec {
            name: "mks-prod".into(),
            description: Some("prod".into()),
            resource_prefix: Some("mks".into()),
            hostname_prefix: Some("mks-host".into()),
            cloud_id: 1,
            group_id: 2,
            cluster_layout_id: 3,
            api_proxy_id: None,
            pod_cidr: "172.20.0.0/16".into(),
            service_cidr: "172.30.0.0/16".into(),
            cluster_repo_account_id: Some(4),
            workflow_id: None,
            master_node_pool: MasterNodePool {
                plan_id: 10,
                resource_pool_id: Some(20),
                storage_volumes: vec![StorageVolume {
                    uuid: None,
                    root: true,
                    name: "root".into(),
                    size: 40,
                    storage_type: Some(1),
                    datastore_id: Some(9),
                }],
                network_interfaces: vec![NetworkInterface { network_id: 5 }],
                tags: BTreeMap::new(),
            },
            worker_node_pool: WorkerNodePool {
                count: 3,
                plan_id: 11,
                resource_pool_id: Some(21),
                storage_volumes: Vec::new(),
                network_interfaces: vec![NetworkInterface { network_id: 5 }],
                tags: BTreeMap::from([
                    ("zone".to_string(), "b".to_string()),
                    ("env".to_string(), "prod".to_string()),
                ]),
            },
        }
    }

    fn worker(id: i64) -> ClusterWorker {
        ClusterWorker {
            id,
            name: format!("worker-{}", id),
            status: Status::Provisioned,
            date_created: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, id as u32).unwrap(),
            plan: Some(IdRef::new(11)),
            resource_pool_id: Some(21),
            compute_server_type: Some(IdRef::new(250)),
            volumes: vec![WorkerVolume {
                uuid: Some("u-1".into()),
                name: "root".into(),
                root_volume: true,
                max_storage: 10_737_418_240,
                datastore_id: Some(9),
                type_id: Some(1),
            }],
            interfaces: vec![WorkerInterface {
                network: Some(IdRef::new(5)),
            }],
            tags: vec![Tag {
                name: "env".into(),
                value: "prod".into(),
            }],
        }
    }

    #[test]
    fn test_network_encodings_diverge_per_call_site() {
        let create = serde_json::to_value(create_cluster_request(&spec())).unwrap();
        assert_eq!(
            create["cluster"]["server"]["networkInterfaces"][0],
            json!({"network": {"id": "network-5"}})
        );
        assert_eq!(
            create["cluster"]["worker"]["networkInterfaces"][0],
            json!({"network": {"id": 5}})
        );

        let add = serde_json::to_value(add_worker_request(&spec(), &worker(1), 2)).unwrap();
        assert_eq!(
            add["server"]["networkInterfaces"][0],
            json!({"network": {"id": "network-5"}})
        );
    }

    #[test]
    fn test_tags_sorted_by_name() {
        let tags = encode_tags(&spec().worker_node_pool.tags);
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["env", "zone"]);
    }

    #[test]
    fn test_create_payload_shape() {
        let value = serde_json::to_value(create_cluster_request(&spec())).unwrap();
        let cluster = &value["cluster"];
        assert_eq!(cluster["type"], "kubernetes-cluster");
        assert_eq!(cluster["autoRecoverPowerState"], false);
        assert_eq!(cluster["layout"]["id"], 3);
        assert_eq!(cluster["server"]["nodeCount"], 3);
        assert_eq!(cluster["server"]["config"]["defaultRepoAccount"], 4);
        assert_eq!(cluster["server"]["name"], "mks");
        assert_eq!(cluster["server"]["volumes"][0]["rootVolume"], true);
        assert_eq!(cluster["worker"]["server"]["plan"]["id"], 11);
        // Unset optional ids stay off the wire
        assert!(cluster.get("taskSetId").is_none());
        assert!(cluster["server"].get("apiProxy").is_none());
        assert!(cluster["server"].get("tags").is_none());
    }

    #[test]
    fn test_add_worker_payload() {
        let value = serde_json::to_value(add_worker_request(&spec(), &worker(1), 2)).unwrap();
        let server = &value["server"];
        assert_eq!(server["nodeCount"], 2);
        assert_eq!(server["serverType"]["id"], 250);
        assert_eq!(server["cloud"]["id"], 1);
        assert_eq!(server["server"], json!({"network": {}}));
        assert_eq!(server["tags"][0], json!({"name": "env", "value": "prod"}));
    }

    #[test]
    fn test_patch_contains_only_changed_fields() {
        let prior = spec();
        assert!(cluster_patch(&prior, &prior).is_none());

        let mut desired = spec();
        desired.description = Some("staging".into());
        let patch = cluster_patch(&prior, &desired).unwrap();
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"cluster": {"description": "staging"}})
        );
    }

    #[test]
    fn test_volume_size_read_back_in_gb() {
        assert_eq!(bytes_to_gb(10_737_418_240), 10);
        assert_eq!(bytes_to_gb((1 << 30) - 1), 0);

        let cluster = Cluster {
            id: 7,
            name: "mks-prod".into(),
            description: None,
            status: Status::Ok,
            zone: Some(IdRef::new(1)),
            site: Some(IdRef::new(2)),
            layout: Some(IdRef::new(3)),
            service_version: Some("1.29.1".into()),
            service_url: Some("https://10.0.0.1:6443".into()),
        };
        let observed = observe(&cluster, &[worker(1), worker(2), worker(3)]).unwrap();
        let pool = &observed.worker_node_pool;
        assert_eq!(pool.count, 3);
        assert_eq!(pool.storage_volumes[0].size, 10);
        assert_eq!(pool.plan_id, 11);
        assert_eq!(pool.network_interfaces, vec![NetworkInterface { network_id: 5 }]);
        assert_eq!(pool.tags.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_unreported_volume_ids_stay_unset() {
        let cluster = Cluster {
            id: 7,
            name: "mks-prod".into(),
            description: None,
            status: Status::Ok,
            zone: None,
            site: None,
            layout: None,
            service_version: None,
            service_url: None,
        };
        let mut bare = worker(1);
        bare.volumes[0].type_id = None;
        bare.volumes[0].datastore_id = None;

        // Nothing declared to fall back on
        let mut state = ClusterState::import(7);
        observe(&cluster, std::slice::from_ref(&bare))
            .unwrap()
            .apply_to(&mut state);
        let volume = &state.spec.worker_node_pool.storage_volumes[0];
        assert_eq!(volume.storage_type, None);
        assert_eq!(volume.datastore_id, None);

        // The declared volume of the same name fills the gaps
        let mut state = ClusterState::new(spec());
        state.spec.worker_node_pool.storage_volumes = vec![StorageVolume {
            uuid: None,
            root: true,
            name: "root".into(),
            size: 10,
            storage_type: Some(3),
            datastore_id: Some(8),
        }];
        observe(&cluster, &[bare]).unwrap().apply_to(&mut state);
        let volume = &state.spec.worker_node_pool.storage_volumes[0];
        assert_eq!(volume.storage_type, Some(3));
        assert_eq!(volume.datastore_id, Some(8));
        assert_eq!(volume.uuid.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_observe_without_workers_is_an_error() {
        let cluster = Cluster {
            id: 7,
            name: "mks-prod".into(),
            description: None,
            status: Status::Ok,
            zone: None,
            site: None,
            layout: None,
            service_version: None,
            service_url: None,
        };
        assert!(matches!(observe(&cluster, &[]), Err(Error::Invariant(_))));
    }
}
