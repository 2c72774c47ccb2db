// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! REST implementation of the remote services.
//!
//! Talks to version 2.0 of the workspace REST API. A single [`RestClient`]
//! implements every service trait, and is cheap to share between tasks since
//! the underlying HTTP client pools its connections internally.

use crate::{
    remote::{
        find_job_by_name,
        model::{ClusterInfo, Job, LibraryFullStatus, Run, RunHandle},
        ClusterService, JobService, LibraryService, RemoteError, Result,
    },
    settings::{
        cluster::{ClusterSettings, ClusterSpec},
        job::JobSettings,
        library::Library,
    },
};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, de::IgnoredAny, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

const API_PREFIX: &str = "api/2.0";

/// Client of the workspace REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    host: String,
    token: String,
}

impl RestClient {
    /// Construct new client for workspace at host.
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            host: host.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{API_PREFIX}/{endpoint}", self.host))
            .bearer_auth(&self.token)
    }

    pub(crate) async fn get<T>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!("GET {endpoint} {query:?}");
        self.send(endpoint, self.request(Method::GET, endpoint).query(query))
            .await
    }

    pub(crate) async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {endpoint}");
        self.send(endpoint, self.request(Method::POST, endpoint).json(body))
            .await
    }

    async fn send<T>(&self, endpoint: &str, request: RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let transport = |err| RemoteError::Transport {
            source: err,
            endpoint: endpoint.to_string(),
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(RemoteError::Api {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: api_message(&body),
            });
        }

        // INVARIANT: Empty bodies decode like empty objects.
        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        serde_json::from_str(body).map_err(|err| RemoteError::Decode {
            source: err,
            endpoint: endpoint.to_string(),
        })
    }
}

fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ApiError {
        #[serde(default)]
        error_code: String,
        #[serde(default)]
        message: String,
    }

    match serde_json::from_str::<ApiError>(body) {
        Ok(error) if !error.message.is_empty() => {
            format!("{}: {}", error.error_code, error.message)
        }
        _ => body.trim().to_string(),
    }
}

#[derive(Serialize)]
struct ClusterRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster_id: Option<&'a str>,
    cluster_name: &'a str,
    #[serde(flatten)]
    spec: &'a ClusterSpec,
}

#[derive(Deserialize)]
struct ClusterList {
    #[serde(default)]
    clusters: Vec<ClusterInfo>,
}

#[derive(Deserialize)]
struct ClusterCreated {
    cluster_id: String,
}

#[derive(Deserialize)]
struct LibraryStatuses {
    #[serde(default)]
    library_statuses: Vec<LibraryFullStatus>,
}

#[derive(Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Deserialize)]
struct JobCreated {
    job_id: i64,
}

#[derive(Deserialize)]
struct RunList {
    #[serde(default)]
    runs: Vec<Run>,
}

#[async_trait]
impl ClusterService for RestClient {
    async fn list(&self) -> Result<Vec<ClusterInfo>> {
        let list: ClusterList = self.get("clusters/list", &[]).await?;
        Ok(list.clusters)
    }

    #[instrument(skip(self, settings), fields(cluster = %settings.cluster_name), level = "debug")]
    async fn create(&self, settings: &ClusterSettings) -> Result<String> {
        let request = ClusterRequest {
            cluster_id: None,
            cluster_name: &settings.cluster_name,
            spec: &settings.spec,
        };
        let created: ClusterCreated = self.post("clusters/create", &request).await?;
        info!("created cluster {:?} as {}", settings.cluster_name, created.cluster_id);
        Ok(created.cluster_id)
    }

    #[instrument(skip(self, settings), fields(cluster = %settings.cluster_name), level = "debug")]
    async fn edit(&self, cluster_id: &str, settings: &ClusterSettings) -> Result<()> {
        let request = ClusterRequest {
            cluster_id: Some(cluster_id),
            cluster_name: &settings.cluster_name,
            spec: &settings.spec,
        };
        let _: IgnoredAny = self.post("clusters/edit", &request).await?;
        Ok(())
    }

    async fn get_info(&self, cluster_id: &str) -> Result<ClusterInfo> {
        self.get("clusters/get", &[("cluster_id", cluster_id.to_string())])
            .await
    }

    async fn start(&self, cluster_id: &str) -> Result<()> {
        let _: IgnoredAny = self
            .post("clusters/start", &json!({ "cluster_id": cluster_id }))
            .await?;
        Ok(())
    }

    async fn delete(&self, cluster_id: &str) -> Result<()> {
        let _: IgnoredAny = self
            .post("clusters/delete", &json!({ "cluster_id": cluster_id }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LibraryService for RestClient {
    async fn cluster_status(&self, cluster_id: &str) -> Result<Vec<LibraryFullStatus>> {
        let statuses: LibraryStatuses = self
            .get("libraries/cluster-status", &[("cluster_id", cluster_id.to_string())])
            .await?;
        Ok(statuses.library_statuses)
    }

    async fn install(&self, cluster_id: &str, libraries: &[Library]) -> Result<()> {
        let body = json!({ "cluster_id": cluster_id, "libraries": libraries });
        let _: IgnoredAny = self.post("libraries/install", &body).await?;
        Ok(())
    }

    async fn uninstall(&self, cluster_id: &str, libraries: &[Library]) -> Result<()> {
        let body = json!({ "cluster_id": cluster_id, "libraries": libraries });
        let _: IgnoredAny = self.post("libraries/uninstall", &body).await?;
        Ok(())
    }
}

#[async_trait]
impl JobService for RestClient {
    async fn list_all_jobs(&self) -> Result<Vec<Job>> {
        let list: JobList = self.get("jobs/list", &[]).await?;
        Ok(list.jobs)
    }

    async fn get_job_by_name(&self, name: &str, fail_on_duplicate: bool) -> Result<Option<Job>> {
        find_job_by_name(self.list_all_jobs().await?, name, fail_on_duplicate)
    }

    async fn get_job(&self, job_id: i64) -> Result<Job> {
        self.get("jobs/get", &[("job_id", job_id.to_string())]).await
    }

    #[instrument(skip(self, settings), fields(job = %settings.name), level = "debug")]
    async fn upsert_job(&self, settings: &JobSettings, fail_on_duplicate: bool) -> Result<i64> {
        match self.get_job_by_name(&settings.name, fail_on_duplicate).await? {
            Some(existing) => {
                let body = json!({ "job_id": existing.job_id, "new_settings": settings });
                let _: IgnoredAny = self.post("jobs/reset", &body).await?;
                info!("reset job {:?} ({})", settings.name, existing.job_id);
                Ok(existing.job_id)
            }
            None => {
                let created: JobCreated = self.post("jobs/create", settings).await?;
                info!("created job {:?} as {}", settings.name, created.job_id);
                Ok(created.job_id)
            }
        }
    }

    async fn run_job_now(&self, job_id: i64) -> Result<RunHandle> {
        self.post("jobs/run-now", &json!({ "job_id": job_id })).await
    }

    async fn list_runs(
        &self,
        job_id: i64,
        active_only: bool,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Run>> {
        let query = [
            ("job_id", job_id.to_string()),
            ("active_only", active_only.to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        let list: RunList = self.get("jobs/runs/list", &query).await?;
        Ok(list.runs)
    }

    async fn cancel_run(&self, run_id: i64) -> Result<()> {
        let _: IgnoredAny = self
            .post("jobs/runs/cancel", &json!({ "run_id": run_id }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cluster_request_flattens_spec() -> anyhow::Result<()> {
        let spec = ClusterSpec {
            spark_version: Some("13.3.x-scala2.12".into()),
            num_workers: 2,
            ..Default::default()
        };
        let request = ClusterRequest {
            cluster_id: Some("0923-164208-meows279"),
            cluster_name: "team1/app",
            spec: &spec,
        };

        let result = serde_json::to_value(&request)?;
        let expect = json!({
            "cluster_id": "0923-164208-meows279",
            "cluster_name": "team1/app",
            "spark_version": "13.3.x-scala2.12",
            "num_workers": 2
        });
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn api_message_prefers_structured_errors() {
        let result =
            api_message(r#"{"error_code":"INVALID_STATE","message":"cluster is terminating"}"#);
        assert_eq!(result, "INVALID_STATE: cluster is terminating");

        let result = api_message("  gateway timeout \n");
        assert_eq!(result, "gateway timeout");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = RestClient::new("https://example.cloud.databricks.com/", "token");
        assert_eq!(client.host, "https://example.cloud.databricks.com");
    }
}
