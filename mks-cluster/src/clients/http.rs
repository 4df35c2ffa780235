//! reqwest client for the Morpheus REST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ApiError, ApiResult, Cluster, ClusterApi, ClusterWorker, DeleteClusterOptions, Host};
use crate::payload::{AddWorkerRequest, ClusterPatchRequest, CreateClusterRequest};

#[derive(Deserialize)]
struct ClusterEnvelope {
    cluster: Cluster,
}

#[derive(Deserialize)]
struct ClustersEnvelope {
    #[serde(default)]
    clusters: Vec<Cluster>,
}

#[derive(Deserialize)]
struct WorkersEnvelope {
    #[serde(default)]
    workers: Vec<ClusterWorker>,
}

#[derive(Deserialize)]
struct ServersEnvelope {
    #[serde(default)]
    servers: Vec<Host>,
}

/// Morpheus API client authenticated with a bearer access token.
#[derive(Clone)]
pub struct HttpClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> ApiResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("mks-cluster/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<reqwest::Response> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %body, "API FAILURE");
        if status == StatusCode::NOT_FOUND {
            Err(ApiError::NotFound(body))
        } else {
            Err(ApiError::Status {
                code: status.as_u16(),
                message: body,
            })
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        debug!(body = %body, "API RESPONSE");
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ClusterApi for HttpClient {
    async fn create_cluster(&self, request: &CreateClusterRequest) -> ApiResult<Cluster> {
        let req = self.http.post(self.url("/clusters")).json(request);
        let envelope: ClusterEnvelope = self.send_json(req).await?;
        Ok(envelope.cluster)
    }

    async fn get_cluster(&self, id: i64) -> ApiResult<Cluster> {
        let req = self.http.get(self.url(&format!("/clusters/{}", id)));
        let envelope: ClusterEnvelope = self.send_json(req).await?;
        Ok(envelope.cluster)
    }

    async fn find_cluster_by_name(&self, name: &str) -> ApiResult<Cluster> {
        let req = self
            .http
            .get(self.url("/clusters"))
            .query(&[("name", name)]);
        let envelope: ClustersEnvelope = self.send_json(req).await?;
        let found = envelope
            .clusters
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ApiError::NotFound(format!("cluster not found by name {}", name)))?;
        self.get_cluster(found.id).await
    }

    async fn update_cluster(&self, id: i64, request: &ClusterPatchRequest) -> ApiResult<()> {
        let req = self
            .http
            .put(self.url(&format!("/clusters/{}", id)))
            .json(request);
        self.send(req).await?;
        Ok(())
    }

    async fn delete_cluster(&self, id: i64, options: &DeleteClusterOptions) -> ApiResult<()> {
        let req = self
            .http
            .delete(self.url(&format!("/clusters/{}", id)))
            .query(&options.query());
        self.send(req).await?;
        Ok(())
    }

    async fn list_cluster_workers(&self, cluster_id: i64) -> ApiResult<Vec<ClusterWorker>> {
        let req = self
            .http
            .get(self.url(&format!("/clusters/{}/workers", cluster_id)));
        let envelope: WorkersEnvelope = self.send_json(req).await?;
        Ok(envelope.workers)
    }

    async fn add_cluster_worker(
        &self,
        cluster_id: i64,
        request: &AddWorkerRequest,
    ) -> ApiResult<()> {
        let req = self
            .http
            .post(self.url(&format!("/clusters/{}/servers", cluster_id)))
            .json(request);
        self.send(req).await?;
        Ok(())
    }

    async fn delete_cluster_worker(&self, cluster_id: i64, worker_id: i64) -> ApiResult<()> {
        let req = self.http.delete(self.url(&format!(
            "/clusters/{}/servers/{}",
            cluster_id, worker_id
        )));
        self.send(req).await?;
        Ok(())
    }

    async fn list_hosts_by_cluster(&self, cluster_id: i64) -> ApiResult<Vec<Host>> {
        let req = self
            .http
            .get(self.url("/servers"))
            .query(&[("clusterId", cluster_id.to_string())]);
        let envelope: ServersEnvelope = self.send_json(req).await?;
        Ok(envelope.servers)
    }
}
