// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Job control commands.
//!
//! Controlling a job means controlling its active runs:
//!
//! - __START__ triggers a new run, but refuses to do so while any run is
//!   still active.
//! - __STOP__ cancels every active run.
//! - __RESTART__ stops the job, waits until no run is active anymore, and
//!   then starts it.
//!
//! Waiting for runs to drain has no deadline unless the wait policy of the
//! orchestrator carries one.
//!
//! # Name Filter
//!
//! Some jobs should never be controlled blindly, e.g., batch jobs that are
//! not meant to run continuously. An optional name filter restricts control
//! commands to jobs whose name matches it. Declared jobs that do not match
//! are skipped with a warning.

use crate::{
    converge::{converge, Observed},
    job::{remote, JobError, JobOrchestrator, Result},
    remote::model::{Job, Run},
    settings::job::JobSettings,
};

use async_trait::async_trait;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tracing::{debug, info, instrument, warn};

/// Control command for declared jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCommand {
    Start,
    Stop,
    Restart,
}

impl JobCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }

    /// Operation carrying out command.
    pub fn operation(self) -> &'static dyn JobOperation {
        match self {
            Self::Start => &StartJob,
            Self::Stop => &StopJob,
            Self::Restart => &RestartJob,
        }
    }
}

impl FromStr for JobCommand {
    type Err = UnknownJobCommand;

    fn from_str(data: &str) -> std::result::Result<Self, Self::Err> {
        match data.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            _ => Err(UnknownJobCommand {
                command: data.to_string(),
            }),
        }
    }
}

impl Display for JobCommand {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Job control command is not known.
#[derive(Debug, thiserror::Error)]
#[error("unknown job command {command:?}, expected one of start, stop, restart")]
pub struct UnknownJobCommand {
    pub command: String,
}

/// Single control operation on a job.
#[async_trait]
pub trait JobOperation: Send + Sync {
    /// Carry out operation on remote job.
    async fn execute(&self, orchestrator: &JobOrchestrator, job: &Job) -> Result<()>;
}

/// Trigger new run of idle job.
#[derive(Debug, Default, Clone, Copy)]
pub struct StartJob;

#[async_trait]
impl JobOperation for StartJob {
    async fn execute(&self, orchestrator: &JobOrchestrator, job: &Job) -> Result<()> {
        let active = orchestrator.active_runs(job).await?;
        if !active.is_empty() {
            return Err(JobError::AlreadyRunning {
                name: job.name().to_string(),
                job_id: job.job_id,
                active: active.len(),
            });
        }

        let handle = orchestrator
            .jobs
            .run_job_now(job.job_id)
            .await
            .map_err(|err| remote(err, job.name(), "run"))?;
        info!("started job {:?} ({}) as run {}", job.name(), job.job_id, handle.run_id);

        Ok(())
    }
}

/// Cancel every active run of job.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopJob;

#[async_trait]
impl JobOperation for StopJob {
    async fn execute(&self, orchestrator: &JobOrchestrator, job: &Job) -> Result<()> {
        let active = orchestrator.active_runs(job).await?;
        if active.is_empty() {
            info!("job {:?} ({}) has no active runs", job.name(), job.job_id);
            return Ok(());
        }

        for run in active {
            info!("cancel run {} of job {:?}", run.run_id, job.name());
            orchestrator
                .jobs
                .cancel_run(run.run_id)
                .await
                .map_err(|err| remote(err, job.name(), "cancel run of"))?;
        }

        Ok(())
    }
}

/// Stop job, wait for its runs to drain, then start it.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestartJob;

#[async_trait]
impl JobOperation for RestartJob {
    async fn execute(&self, orchestrator: &JobOrchestrator, job: &Job) -> Result<()> {
        StopJob.execute(orchestrator, job).await?;
        orchestrator.await_drained(job).await?;
        StartJob.execute(orchestrator, job).await
    }
}

impl JobOrchestrator {
    /// Control declared jobs.
    ///
    /// Declared jobs go through merge and validation first, so a job gets
    /// the same name it would get when upserted.
    ///
    /// # Errors
    ///
    /// - Return any error of [`JobOrchestrator::prepare`].
    /// - Return [`JobError::NotFound`] if a declared job has no remote
    ///   counterpart.
    /// - Return any error of the [`JobOperation`] carrying out the command.
    #[instrument(skip(self, declared), level = "debug")]
    pub async fn control(&self, declared: Vec<JobSettings>, command: JobCommand) -> Result<()> {
        let prepared = self.prepare(declared)?;
        let operation = command.operation();

        for settings in prepared {
            if !self.is_controllable(&settings.name) {
                warn!("skip {command} of job {:?}, name does not match filter", settings.name);
                continue;
            }

            let job = self
                .find(&settings.name)
                .await?
                .ok_or_else(|| JobError::NotFound {
                    name: settings.name.clone(),
                })?;
            info!("{command} job {:?} ({})", job.name(), job.job_id);
            operation.execute(self, &job).await?;
        }

        Ok(())
    }

    fn is_controllable(&self, name: &str) -> bool {
        self.name_filter
            .as_ref()
            .is_none_or(|filter| filter.is_match(name))
    }

    /// Every active run of job, across all pages.
    ///
    /// # Errors
    ///
    /// - Return [`JobError::Remote`] if runs cannot be listed.
    pub async fn active_runs(&self, job: &Job) -> Result<Vec<Run>> {
        let mut runs = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .jobs
                .list_runs(job.job_id, true, offset, self.page_size)
                .await
                .map_err(|err| remote(err, job.name(), "list runs of"))?;
            let full = page.len() >= self.page_size as usize;
            offset += page.len() as u32;
            runs.extend(page);

            if !full {
                break;
            }
        }

        debug!("job {:?} has {} active runs", job.name(), runs.len());
        Ok(runs)
    }

    /// Wait until job has no active runs anymore.
    ///
    /// # Errors
    ///
    /// - Return [`JobError::Wait`] if runs cannot be listed, or the wait
    ///   times out or gets cancelled.
    pub async fn await_drained(&self, job: &Job) -> Result<()> {
        let subject = format!("runs of job {:?} to drain", job.name());
        converge(&self.policy, &subject, || async move {
            let page = self
                .jobs
                .list_runs(job.job_id, true, 0, self.page_size)
                .await;
            page.map(|page| match page.len() {
                0 => Observed::Ready(()),
                count => Observed::Waiting(format!("{count} active runs")),
            })
        })
        .await
        .map_err(|err| JobError::Wait {
            source: err,
            name: job.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("start", JobCommand::Start; "start")]
    #[test_case("stop", JobCommand::Stop; "stop")]
    #[test_case("RESTART", JobCommand::Restart; "restart uppercase")]
    #[test]
    fn parse_job_command(input: &str, expect: JobCommand) -> anyhow::Result<()> {
        use pretty_assertions::assert_eq;
        let result: JobCommand = input.parse()?;
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn parse_unknown_job_command() {
        assert!("resume".parse::<JobCommand>().is_err());
    }
}
