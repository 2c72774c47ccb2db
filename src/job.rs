// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Job orchestration.
//!
//! Declared jobs are job settings documents shipped with a project. They
//! share the merge and validate pipeline with clusters, and are then either
//! upserted by name, or used to control the runs of their remote
//! counterparts.
//!
//! # Upsert
//!
//! Every declared job is upserted one after the other. The first failure
//! aborts the whole operation. After each upsert the job is looked up by
//! name once more, and not finding it is treated as an inconsistency of the
//! control plane rather than a transient fault.
//!
//! # Control
//!
//! See [`control`].

pub mod control;

use crate::{
    converge::{WaitError, WaitPolicy},
    merge::{DefaultMerger, MergeError},
    remote::{model::Job, JobService, RemoteError},
    settings::job::JobSettings,
    validate::{ValidationError, Validator},
};

use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default number of runs requested per page.
pub const DEFAULT_RUN_PAGE_SIZE: u32 = 25;

/// Job upserted to the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub name: String,
    pub job_id: i64,
}

/// Converge remote jobs to declared jobs.
#[derive(Clone)]
pub struct JobOrchestrator {
    pub(crate) jobs: Arc<dyn JobService>,
    pub(crate) merger: DefaultMerger,
    pub(crate) validator: Validator,
    pub(crate) policy: WaitPolicy,
    pub(crate) fail_on_duplicate: bool,
    pub(crate) name_filter: Option<Regex>,
    pub(crate) page_size: u32,
}

impl JobOrchestrator {
    /// Construct new job orchestrator.
    ///
    /// Duplicate job names fail lookups, and every declared job is subject to
    /// control commands, unless configured otherwise.
    pub fn new(
        jobs: Arc<dyn JobService>,
        merger: DefaultMerger,
        validator: Validator,
        policy: WaitPolicy,
    ) -> Self {
        Self {
            jobs,
            merger,
            validator,
            policy,
            fail_on_duplicate: true,
            name_filter: None,
            page_size: DEFAULT_RUN_PAGE_SIZE,
        }
    }

    /// Toggle whether several remote jobs sharing a name is an error.
    pub fn fail_on_duplicate(mut self, fail: bool) -> Self {
        self.fail_on_duplicate = fail;
        self
    }

    /// Restrict control commands to jobs whose name matches filter.
    pub fn name_filter(mut self, filter: Option<Regex>) -> Self {
        self.name_filter = filter;
        self
    }

    /// Set number of runs requested per page.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Merge and validate declared jobs.
    ///
    /// # Errors
    ///
    /// - Return [`JobError::Merge`] if defaults cannot be merged.
    /// - Return [`JobError::Validation`] if a merged job is invalid.
    #[instrument(skip(self, declared), level = "debug")]
    pub fn prepare(&self, declared: Vec<JobSettings>) -> Result<Vec<JobSettings>> {
        declared
            .into_iter()
            .map(|document| -> Result<JobSettings> {
                let merged = self.merger.merge_job(document)?;
                debug!(
                    "merged job {:?} with {} defaults",
                    merged.document.name,
                    merged.fills.len()
                );
                self.validator.validate_job(&merged.document)?;
                Ok(merged.document)
            })
            .collect()
    }

    /// Upsert declared jobs by name.
    ///
    /// # Errors
    ///
    /// - Return any error of [`JobOrchestrator::prepare`].
    /// - Return [`JobError::Remote`] if a job cannot be upserted or looked
    ///   up.
    /// - Return [`JobError::Inconsistent`] if an upserted job cannot be found
    ///   by name afterwards.
    #[instrument(skip(self, declared), level = "debug")]
    pub async fn upsert(&self, declared: Vec<JobSettings>) -> Result<Vec<JobRecord>> {
        let prepared = self.prepare(declared)?;

        let mut records = Vec::with_capacity(prepared.len());
        for settings in prepared {
            let name = settings.name.clone();
            let job_id = self
                .jobs
                .upsert_job(&settings, self.fail_on_duplicate)
                .await
                .map_err(|err| remote(err, &name, "upsert"))?;

            let confirmed = self.find(&name).await?;
            if confirmed.as_ref().map(|job| job.job_id) != Some(job_id) {
                return Err(JobError::Inconsistent {
                    name,
                    job_id,
                    found: confirmed.map(|job| job.job_id),
                });
            }

            info!("upserted job {name:?} ({job_id})");
            records.push(JobRecord { name, job_id });
        }

        Ok(records)
    }

    /// Look up remote job by name, respecting the duplicate name policy.
    ///
    /// # Errors
    ///
    /// - Return [`JobError::Remote`] if jobs cannot be listed, or several
    ///   share the name while duplicates are not allowed.
    pub async fn find(&self, name: &str) -> Result<Option<Job>> {
        self.jobs
            .get_job_by_name(name, self.fail_on_duplicate)
            .await
            .map_err(|err| remote(err, name, "look up"))
    }
}

pub(crate) fn remote(source: RemoteError, name: &str, command: &'static str) -> JobError {
    JobError::Remote {
        source,
        name: name.to_string(),
        command,
    }
}

/// Job orchestration error types.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Defaults cannot be merged into declared job.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Merged job is invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Job call failed.
    #[error("failed to {command} job {name:?}")]
    Remote {
        #[source]
        source: RemoteError,
        name: String,
        command: &'static str,
    },

    /// No remote job has the declared name.
    #[error("no job named {name:?}")]
    NotFound { name: String },

    /// Upserted job cannot be found by name afterwards.
    #[error("job {name:?} was upserted as {job_id}, but lookup by name found {found:?}")]
    Inconsistent {
        name: String,
        job_id: i64,
        found: Option<i64>,
    },

    /// Job cannot be started while it still runs.
    #[error("job {name:?} ({job_id}) already has {active} active runs")]
    AlreadyRunning {
        name: String,
        job_id: i64,
        active: usize,
    },

    /// Active runs did not drain.
    #[error("runs of job {name:?} did not drain")]
    Wait {
        #[source]
        source: WaitError,
        name: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = JobError> = std::result::Result<T, E>;
