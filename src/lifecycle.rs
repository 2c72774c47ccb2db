// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Cluster state machine.
//!
//! Clusters move through their states on their own once told to start or
//! terminate. These helpers issue the command that moves a cluster toward
//! the desired state, and then wait until it gets there:
//!
//! ```text
//! TERMINATED --start--> PENDING --> RUNNING
//! RUNNING --delete--> TERMINATING --> TERMINATED
//! ```
//!
//! Transitional states (PENDING, RESIZING, RESTARTING, TERMINATING) are
//! simply waited out. A start command is only issued from TERMINATED, since
//! the control plane rejects it anywhere else.

use crate::{
    converge::{converge, Observed, WaitError, WaitPolicy},
    remote::{
        model::{ClusterInfo, ClusterState},
        ClusterService, RemoteError,
    },
};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, info, instrument};

/// Drive clusters between running and terminated.
#[derive(Clone)]
pub struct ClusterLifecycle {
    clusters: Arc<dyn ClusterService>,
    policy: WaitPolicy,
}

impl ClusterLifecycle {
    /// Construct new lifecycle driver.
    pub fn new(clusters: Arc<dyn ClusterService>, policy: WaitPolicy) -> Self {
        Self { clusters, policy }
    }

    /// Current state of cluster.
    ///
    /// # Errors
    ///
    /// - Return [`LifecycleError::Remote`] if cluster cannot be queried.
    pub async fn state(&self, cluster_id: &str) -> Result<ClusterState> {
        let info = self
            .clusters
            .get_info(cluster_id)
            .await
            .map_err(|err| LifecycleError::Remote {
                source: err,
                cluster_id: cluster_id.to_string(),
                command: "get",
            })?;
        Ok(info.state)
    }

    /// Make sure cluster is running, starting it if it is terminated.
    ///
    /// # Errors
    ///
    /// - Return [`LifecycleError::Remote`] if start command fails.
    /// - Return [`LifecycleError::Wait`] if cluster does not reach RUNNING.
    #[instrument(skip(self), level = "debug")]
    pub async fn ensure_running(&self, cluster_id: &str) -> Result<()> {
        let started = AtomicBool::new(false);
        let subject = format!("cluster {cluster_id} to run");

        converge(&self.policy, &subject, || self.check_running(cluster_id, &started))
            .await
            .map_err(|err| LifecycleError::Wait {
                source: err,
                cluster_id: cluster_id.to_string(),
            })
    }

    // INVARIANT: Start command is issued at most once per wait.
    //   Transitional states seen before TERMINATED do not use it up.
    async fn check_running(
        &self,
        cluster_id: &str,
        started: &AtomicBool,
    ) -> Result<Observed<()>, RemoteError> {
        let ClusterInfo { state, .. } = self.clusters.get_info(cluster_id).await?;
        match state {
            ClusterState::Running => {
                debug!("cluster {cluster_id} is running");
                Ok(Observed::Ready(()))
            }
            ClusterState::Terminated if !started.load(Ordering::Acquire) => {
                info!("start cluster {cluster_id}");
                self.clusters.start(cluster_id).await?;
                started.store(true, Ordering::Release);
                Ok(Observed::Waiting(state.to_string()))
            }
            _ => Ok(Observed::Waiting(state.to_string())),
        }
    }

    /// Terminate cluster and wait until it is terminated.
    ///
    /// # Errors
    ///
    /// - Return [`LifecycleError::Remote`] if terminate command fails.
    /// - Return [`LifecycleError::Wait`] if cluster does not reach
    ///   TERMINATED.
    #[instrument(skip(self), level = "debug")]
    pub async fn terminate(&self, cluster_id: &str) -> Result<()> {
        info!("terminate cluster {cluster_id}");
        self.clusters
            .delete(cluster_id)
            .await
            .map_err(|err| LifecycleError::Remote {
                source: err,
                cluster_id: cluster_id.to_string(),
                command: "delete",
            })?;

        let subject = format!("cluster {cluster_id} to terminate");
        converge(&self.policy, &subject, || async move {
            let info = self.clusters.get_info(cluster_id).await;
            info.map(|info| match info.state {
                ClusterState::Terminated => Observed::Ready(()),
                state => Observed::Waiting(state.to_string()),
            })
        })
        .await
        .map_err(|err| LifecycleError::Wait {
            source: err,
            cluster_id: cluster_id.to_string(),
        })
    }

    /// Terminate cluster, then start it again.
    ///
    /// # Errors
    ///
    /// - Return any error of [`ClusterLifecycle::terminate`] or
    ///   [`ClusterLifecycle::ensure_running`].
    pub async fn restart(&self, cluster_id: &str) -> Result<()> {
        info!("restart cluster {cluster_id}");
        self.terminate(cluster_id).await?;
        self.ensure_running(cluster_id).await
    }
}

/// Cluster lifecycle error types.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Command to cluster failed.
    #[error("failed to {command} cluster {cluster_id}")]
    Remote {
        #[source]
        source: RemoteError,
        cluster_id: String,
        command: &'static str,
    },

    /// Cluster did not reach desired state.
    #[error("cluster {cluster_id} did not converge")]
    Wait {
        #[source]
        source: WaitError,
        cluster_id: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = LifecycleError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::cluster::ClusterSettings;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::{collections::VecDeque, sync::Mutex, time::Duration};

    /// Cluster reporting a scripted sequence of states.
    #[derive(Default)]
    struct ScriptedCluster {
        states: Mutex<VecDeque<ClusterState>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedCluster {
        fn new(states: impl IntoIterator<Item = ClusterState>) -> Arc<Self> {
            Arc::new(Self {
                states: Mutex::new(states.into_iter().collect()),
                calls: Mutex::default(),
            })
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClusterService for ScriptedCluster {
        async fn list(&self) -> crate::remote::Result<Vec<ClusterInfo>> {
            Ok(Vec::new())
        }

        async fn create(&self, _: &ClusterSettings) -> crate::remote::Result<String> {
            unreachable!("lifecycle never creates clusters")
        }

        async fn edit(&self, _: &str, _: &ClusterSettings) -> crate::remote::Result<()> {
            unreachable!("lifecycle never edits clusters")
        }

        async fn get_info(&self, cluster_id: &str) -> crate::remote::Result<ClusterInfo> {
            let mut states = self.states.lock().unwrap();
            let state = match states.len() {
                0 | 1 => states.front().copied().unwrap_or_default(),
                _ => states.pop_front().unwrap_or_default(),
            };
            Ok(ClusterInfo {
                cluster_id: cluster_id.into(),
                state,
                ..Default::default()
            })
        }

        async fn start(&self, _: &str) -> crate::remote::Result<()> {
            self.calls.lock().unwrap().push("start");
            Ok(())
        }

        async fn delete(&self, _: &str) -> crate::remote::Result<()> {
            self.calls.lock().unwrap().push("delete");
            Ok(())
        }
    }

    fn lifecycle(cluster: Arc<ScriptedCluster>) -> ClusterLifecycle {
        ClusterLifecycle::new(cluster, WaitPolicy::new(Duration::from_secs(1)))
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_running_starts_terminated_cluster_once() -> anyhow::Result<()> {
        let cluster = ScriptedCluster::new([
            ClusterState::Terminated,
            ClusterState::Terminated,
            ClusterState::Pending,
            ClusterState::Running,
        ]);
        lifecycle(cluster.clone()).ensure_running("c1").await?;
        assert_eq!(cluster.calls(), vec!["start"]);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_running_starts_cluster_once_it_finishes_terminating() -> anyhow::Result<()> {
        let cluster = ScriptedCluster::new([
            ClusterState::Terminating,
            ClusterState::Terminating,
            ClusterState::Terminated,
            ClusterState::Pending,
            ClusterState::Running,
        ]);
        let policy = WaitPolicy::new(Duration::from_secs(1))
            .with_deadline(tokio::time::Instant::now() + Duration::from_secs(600));
        ClusterLifecycle::new(cluster.clone(), policy)
            .ensure_running("c1")
            .await?;
        assert_eq!(cluster.calls(), vec!["start"]);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_running_waits_out_transitions() -> anyhow::Result<()> {
        let cluster = ScriptedCluster::new([
            ClusterState::Resizing,
            ClusterState::Restarting,
            ClusterState::Running,
        ]);
        lifecycle(cluster.clone()).ensure_running("c1").await?;
        assert_eq!(cluster.calls(), Vec::<&str>::new());

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn restart_terminates_then_starts() -> anyhow::Result<()> {
        let cluster = ScriptedCluster::new([
            ClusterState::Terminating,
            ClusterState::Terminated,
            ClusterState::Terminated,
            ClusterState::Pending,
            ClusterState::Running,
        ]);
        lifecycle(cluster.clone()).restart("c1").await?;
        assert_eq!(cluster.calls(), vec!["delete", "start"]);

        Ok(())
    }
}
