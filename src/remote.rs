// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote control plane services.
//!
//! Brickyard only ever talks to the control plane through the service traits
//! in this module. The orchestrators hold them as shared trait objects, so
//! they must be stateless enough to be called concurrently from many tasks.
//! The REST implementation lives in [`rest`].

pub mod model;
pub mod rest;

use crate::{
    remote::model::{ClusterInfo, Job, LibraryFullStatus, Run, RunHandle},
    settings::{cluster::ClusterSettings, job::JobSettings, library::Library},
};

use async_trait::async_trait;

/// Cluster management service.
#[async_trait]
pub trait ClusterService: Send + Sync + 'static {
    /// List every cluster of the workspace.
    async fn list(&self) -> Result<Vec<ClusterInfo>>;

    /// Create cluster, returning its remote id.
    async fn create(&self, settings: &ClusterSettings) -> Result<String>;

    /// Replace settings of existing cluster.
    async fn edit(&self, cluster_id: &str, settings: &ClusterSettings) -> Result<()>;

    /// Current information about cluster.
    async fn get_info(&self, cluster_id: &str) -> Result<ClusterInfo>;

    /// Start terminated cluster.
    async fn start(&self, cluster_id: &str) -> Result<()>;

    /// Terminate cluster. The cluster stays listed and can be started again.
    async fn delete(&self, cluster_id: &str) -> Result<()>;
}

/// Library management service.
#[async_trait]
pub trait LibraryService: Send + Sync + 'static {
    /// Libraries known to a cluster.
    async fn cluster_status(&self, cluster_id: &str) -> Result<Vec<LibraryFullStatus>>;

    async fn install(&self, cluster_id: &str, libraries: &[Library]) -> Result<()>;

    async fn uninstall(&self, cluster_id: &str, libraries: &[Library]) -> Result<()>;
}

/// Job management service.
#[async_trait]
pub trait JobService: Send + Sync + 'static {
    /// List every job of the workspace.
    async fn list_all_jobs(&self) -> Result<Vec<Job>>;

    /// Find job by name.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::DuplicateName`] if several jobs share the name
    ///   and `fail_on_duplicate` is set. Otherwise the first one wins.
    async fn get_job_by_name(&self, name: &str, fail_on_duplicate: bool) -> Result<Option<Job>>;

    async fn get_job(&self, job_id: i64) -> Result<Job>;

    /// Update job of same name, or create it if there is none. Returns the
    /// job id.
    async fn upsert_job(&self, settings: &JobSettings, fail_on_duplicate: bool) -> Result<i64>;

    async fn run_job_now(&self, job_id: i64) -> Result<RunHandle>;

    /// One page of runs of a job, newest first.
    async fn list_runs(
        &self,
        job_id: i64,
        active_only: bool,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Run>>;

    async fn cancel_run(&self, run_id: i64) -> Result<()>;
}

/// Pick job by name out of a listing.
///
/// # Errors
///
/// - Return [`RemoteError::DuplicateName`] if several jobs share the name
///   and `fail_on_duplicate` is set.
pub fn find_job_by_name(
    jobs: Vec<Job>,
    name: &str,
    fail_on_duplicate: bool,
) -> Result<Option<Job>> {
    let mut matches = jobs
        .into_iter()
        .filter(|job| job.name() == name)
        .collect::<Vec<_>>();

    if matches.len() > 1 && fail_on_duplicate {
        return Err(RemoteError::DuplicateName {
            kind: "job",
            name: name.to_string(),
            ids: matches.iter().map(|job| job.job_id.to_string()).collect(),
        });
    }

    Ok((!matches.is_empty()).then(|| matches.remove(0)))
}

/// Remote service error types.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Request never got a response.
    #[error("request to {endpoint} failed")]
    Transport {
        #[source]
        source: reqwest::Error,
        endpoint: String,
    },

    /// Control plane answered with an error.
    #[error("{endpoint} answered with status {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// Response body does not have the expected layout.
    #[error("malformed response from {endpoint}")]
    Decode {
        #[source]
        source: serde_json::Error,
        endpoint: String,
    },

    /// Several remote resources share a name that must be unique.
    #[error("found several {kind}s named {name:?}: {ids:?}")]
    DuplicateName {
        kind: &'static str,
        name: String,
        ids: Vec<String>,
    },
}

/// Friendly result alias :3
pub type Result<T, E = RemoteError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job(job_id: i64, name: &str) -> Job {
        Job {
            job_id,
            settings: JobSettings {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn find_job_by_name_respects_duplicate_policy() -> anyhow::Result<()> {
        let jobs = vec![job(1, "team1/app"), job(2, "team1/other"), job(3, "team1/app")];

        let result = find_job_by_name(jobs.clone(), "team1/app", false)?;
        assert_eq!(result.map(|job| job.job_id), Some(1));

        let result = find_job_by_name(jobs.clone(), "team1/app", true);
        assert!(matches!(result, Err(RemoteError::DuplicateName { .. })));

        let result = find_job_by_name(jobs, "team1/missing", true)?;
        assert_eq!(result, None);

        Ok(())
    }
}
