//! Shared test utilities for mks-cluster integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use mks_cluster::clients::{
    ApiError, ApiResult, Cluster, ClusterApi, ClusterWorker, DeleteClusterOptions, Host, IdRef,
    Tag, WorkerInterface, WorkerVolume,
};
use mks_cluster::cluster::{MasterNodePool, NetworkInterface, StorageVolume, WorkerNodePool};
use mks_cluster::payload::{AddWorkerRequest, ClusterPatchRequest, CreateClusterRequest};
use mks_cluster::{ClusterSpec, PollTimings, ReconcilerConfig, Status};

pub const CLUSTER_ID: i64 = 77;

/// Responses handed out in order; the last one repeats forever.
pub struct Script<T: Clone> {
    queue: VecDeque<T>,
}

impl<T: Clone> Script<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            queue: items.into_iter().collect(),
        }
    }

    fn next(&mut self) -> T {
        if self.queue.len() > 1 {
            self.queue.pop_front().unwrap()
        } else {
            self.queue.front().cloned().expect("script is empty")
        }
    }
}

/// A recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateCluster(serde_json::Value),
    GetCluster(i64),
    FindClusterByName(String),
    UpdateCluster(i64, serde_json::Value),
    DeleteCluster(i64, DeleteClusterOptions),
    ListClusterWorkers(i64),
    AddClusterWorker(i64, serde_json::Value),
    DeleteClusterWorker(i64, i64),
    ListHosts(i64),
}

struct FakeState {
    calls: Vec<Call>,
    create: ApiResult<Cluster>,
    get: Script<ApiResult<Cluster>>,
    find: ApiResult<Cluster>,
    update: ApiResult<()>,
    delete: ApiResult<()>,
    workers: Script<ApiResult<Vec<ClusterWorker>>>,
    add_worker: ApiResult<()>,
    hosts: Script<ApiResult<Vec<Host>>>,
}

/// Scripted in-memory Morpheus API that records every call.
pub struct FakeMorpheus {
    state: Mutex<FakeState>,
    get_latency: Duration,
}

impl Default for FakeMorpheus {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMorpheus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                calls: Vec::new(),
                create: Ok(cluster(Status::Provisioning)),
                get: Script::new([Ok(cluster(Status::Ok))]),
                find: Err(ApiError::NotFound("cluster not found by name".into())),
                update: Ok(()),
                delete: Ok(()),
                workers: Script::new([Ok(workers(3, Status::Provisioned))]),
                add_worker: Ok(()),
                hosts: Script::new([Ok(Vec::new())]),
            }),
            get_latency: Duration::ZERO,
        }
    }

    pub fn with_cluster_statuses(self, statuses: &[Status]) -> Self {
        self.with_get(statuses.iter().map(|s| Ok(cluster(s.clone()))))
    }

    pub fn with_get(self, results: impl IntoIterator<Item = ApiResult<Cluster>>) -> Self {
        self.state.lock().unwrap().get = Script::new(results);
        self
    }

    pub fn with_create(self, result: ApiResult<Cluster>) -> Self {
        self.state.lock().unwrap().create = result;
        self
    }

    pub fn with_find(self, result: ApiResult<Cluster>) -> Self {
        self.state.lock().unwrap().find = result;
        self
    }

    pub fn with_delete(self, result: ApiResult<()>) -> Self {
        self.state.lock().unwrap().delete = result;
        self
    }

    pub fn with_workers(self, lists: impl IntoIterator<Item = Vec<ClusterWorker>>) -> Self {
        self.state.lock().unwrap().workers = Script::new(lists.into_iter().map(Ok));
        self
    }

    pub fn with_hosts(self, lists: impl IntoIterator<Item = Vec<Host>>) -> Self {
        self.state.lock().unwrap().hosts = Script::new(lists.into_iter().map(Ok));
        self
    }

    pub fn with_hosts_error(self, error: ApiError) -> Self {
        self.state.lock().unwrap().hosts = Script::new([Err(error)]);
        self
    }

    /// Delay every cluster lookup.
    pub fn with_get_latency(mut self, latency: Duration) -> Self {
        self.get_latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ClusterApi for FakeMorpheus {
    async fn create_cluster(&self, request: &CreateClusterRequest) -> ApiResult<Cluster> {
        let mut s = self.state.lock().unwrap();
        s.calls
            .push(Call::CreateCluster(serde_json::to_value(request).unwrap()));
        s.create.clone()
    }

    async fn get_cluster(&self, id: i64) -> ApiResult<Cluster> {
        if !self.get_latency.is_zero() {
            tokio::time::sleep(self.get_latency).await;
        }
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::GetCluster(id));
        s.get.next()
    }

    async fn find_cluster_by_name(&self, name: &str) -> ApiResult<Cluster> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::FindClusterByName(name.to_string()));
        s.find.clone()
    }

    async fn update_cluster(&self, id: i64, request: &ClusterPatchRequest) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::UpdateCluster(
            id,
            serde_json::to_value(request).unwrap(),
        ));
        s.update.clone()
    }

    async fn delete_cluster(&self, id: i64, options: &DeleteClusterOptions) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::DeleteCluster(id, *options));
        s.delete.clone()
    }

    async fn list_cluster_workers(&self, cluster_id: i64) -> ApiResult<Vec<ClusterWorker>> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::ListClusterWorkers(cluster_id));
        s.workers.next()
    }

    async fn add_cluster_worker(
        &self,
        cluster_id: i64,
        request: &AddWorkerRequest,
    ) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::AddClusterWorker(
            cluster_id,
            serde_json::to_value(request).unwrap(),
        ));
        s.add_worker.clone()
    }

    async fn delete_cluster_worker(&self, cluster_id: i64, worker_id: i64) -> ApiResult<()> {
        self.record(Call::DeleteClusterWorker(cluster_id, worker_id));
        Ok(())
    }

    async fn list_hosts_by_cluster(&self, cluster_id: i64) -> ApiResult<Vec<Host>> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::ListHosts(cluster_id));
        s.hosts.next()
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn cluster(status: Status) -> Cluster {
    Cluster {
        id: CLUSTER_ID,
        name: "mks-prod".into(),
        description: Some("production".into()),
        status,
        zone: Some(IdRef::new(1)),
        site: Some(IdRef::new(2)),
        layout: Some(IdRef::new(3)),
        service_version: Some("1.29.1".into()),
        service_url: Some("https://10.0.0.10:6443".into()),
    }
}

pub fn worker(id: i64, status: Status) -> ClusterWorker {
    ClusterWorker {
        id,
        name: format!("mks-prod-worker-{}", id),
        status,
        date_created: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::minutes(id),
        plan: Some(IdRef::new(11)),
        resource_pool_id: Some(21),
        compute_server_type: Some(IdRef::new(250)),
        volumes: vec![WorkerVolume {
            uuid: Some(format!("vol-{}", id)),
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

/// Workers with ids 1..=n, all in `status`.
pub fn workers(n: i64, status: Status) -> Vec<ClusterWorker> {
    (1..=n).map(|id| worker(id, status.clone())).collect()
}

pub fn host(id: i64, status: Status) -> Host {
    Host {
        id,
        name: format!("host-{}", id),
        status,
    }
}

pub fn spec() -> ClusterSpec {
    ClusterSpec {
        name: "mks-prod".into(),
        description: Some("production".into()),
        resource_prefix: None,
        hostname_prefix: None,
        cloud_id: 1,
        group_id: 2,
        cluster_layout_id: 3,
        api_proxy_id: None,
        pod_cidr: "172.20.0.0/16".into(),
        service_cidr: "172.30.0.0/16".into(),
        cluster_repo_account_id: None,
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
            tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
        },
    }
}

fn fast() -> PollTimings {
    PollTimings {
        timeout: Duration::from_secs(2),
        min_timeout: Duration::from_millis(1),
        delay: Duration::from_millis(1),
        poll_interval: Duration::from_millis(2),
    }
}

/// Reconciler configuration with millisecond poll timings.
pub fn fast_config() -> ReconcilerConfig {
    ReconcilerConfig {
        create_poll: fast(),
        scale_poll: fast(),
        delete_poll: fast(),
        failed_status_grace: Duration::from_millis(5),
        ..ReconcilerConfig::default()
    }
}
