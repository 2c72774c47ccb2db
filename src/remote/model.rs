// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote resource layout.
//!
//! Shapes of the resources reported back by the control plane. Fields the
//! control plane reports but Brickyard never looks at are ignored.

use crate::settings::{job::JobSettings, library::Library};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Lifecycle state of a remote cluster.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    Pending,
    Restarting,
    Resizing,
    Running,
    Terminating,
    Terminated,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ClusterState {
    /// Check whether cluster is running or on its way to running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Restarting | Self::Resizing | Self::Running
        )
    }
}

impl Display for ClusterState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let state = match self {
            Self::Pending => "PENDING",
            Self::Restarting => "RESTARTING",
            Self::Resizing => "RESIZING",
            Self::Running => "RUNNING",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        };
        fmt.write_str(state)
    }
}

/// Remote cluster as listed by the control plane.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ClusterInfo {
    pub cluster_id: String,

    #[serde(default)]
    pub cluster_name: String,

    #[serde(default)]
    pub state: ClusterState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_message: Option<String>,
}

/// Install status of a library on a cluster.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LibraryInstallStatus {
    Pending,
    Resolving,
    Installing,
    Installed,
    Failed,
    UninstallOnRestart,
    Skipped,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Library as reported on a cluster.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct LibraryFullStatus {
    pub library: Library,

    #[serde(default)]
    pub status: LibraryInstallStatus,

    /// Library is installed on every cluster of the workspace, and is not
    /// managed per cluster.
    #[serde(default)]
    pub is_library_for_all_clusters: bool,
}

/// Remote job.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Job {
    pub job_id: i64,

    #[serde(default)]
    pub settings: JobSettings,
}

impl Job {
    pub fn name(&self) -> &str {
        &self.settings.name
    }
}

/// Lifecycle state of a job run.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunLifeCycleState {
    Pending,
    Running,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RunState {
    #[serde(default)]
    pub life_cycle_state: RunLifeCycleState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_message: Option<String>,
}

/// Single run of a job.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Run {
    pub run_id: i64,

    #[serde(default)]
    pub job_id: i64,

    #[serde(default)]
    pub state: RunState,
}

/// Handle of a freshly triggered run.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RunHandle {
    pub run_id: i64,

    #[serde(default)]
    pub number_in_job: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_cluster_states_do_not_fail() -> anyhow::Result<()> {
        let result: Vec<ClusterInfo> = serde_json::from_str(
            r#"[
                { "cluster_id": "1", "cluster_name": "a", "state": "RUNNING" },
                { "cluster_id": "2", "cluster_name": "b", "state": "HIBERNATING" },
                { "cluster_id": "3" }
            ]"#,
        )?;
        let states = result.iter().map(|info| info.state).collect::<Vec<_>>();
        assert_eq!(
            states,
            vec![ClusterState::Running, ClusterState::Unknown, ClusterState::Unknown]
        );

        Ok(())
    }

    #[test]
    fn library_status_layout() -> anyhow::Result<()> {
        let result: LibraryFullStatus = serde_json::from_str(
            r#"{
                "library": { "jar": "dbfs:/libs/app.jar" },
                "status": "UNINSTALL_ON_RESTART",
                "is_library_for_all_clusters": false
            }"#,
        )?;
        assert_eq!(result.library, Library::archive("dbfs:/libs/app.jar"));
        assert_eq!(result.status, LibraryInstallStatus::UninstallOnRestart);

        Ok(())
    }
}
