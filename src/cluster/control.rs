// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Cluster control commands.
//!
//! Declared clusters can be started, stopped, or restarted by name. Each
//! command is its own [`ClusterOperation`], executed against every remote
//! cluster the declared name resolves to.

use crate::{
    cluster::{ClusterError, ClusterOrchestrator, Result},
    lifecycle::{ClusterLifecycle, LifecycleError},
    resolve::resolve_clusters,
};

use async_trait::async_trait;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tracing::{info, instrument};

/// Control command for declared clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterCommand {
    Start,
    Stop,
    Restart,
}

impl ClusterCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }

    /// Operation carrying out command.
    pub fn operation(self) -> &'static dyn ClusterOperation {
        match self {
            Self::Start => &StartCluster,
            Self::Stop => &StopCluster,
            Self::Restart => &RestartCluster,
        }
    }
}

impl FromStr for ClusterCommand {
    type Err = UnknownCommand;

    fn from_str(data: &str) -> std::result::Result<Self, Self::Err> {
        match data.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            _ => Err(UnknownCommand {
                command: data.to_string(),
            }),
        }
    }
}

impl Display for ClusterCommand {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Control command is not known.
#[derive(Debug, thiserror::Error)]
#[error("unknown command {command:?}, expected one of start, stop, restart")]
pub struct UnknownCommand {
    pub command: String,
}

/// Single control operation on a cluster.
#[async_trait]
pub trait ClusterOperation: Send + Sync {
    /// Carry out operation on cluster.
    async fn execute(
        &self,
        lifecycle: &ClusterLifecycle,
        cluster_id: &str,
    ) -> std::result::Result<(), LifecycleError>;
}

/// Make sure cluster runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct StartCluster;

#[async_trait]
impl ClusterOperation for StartCluster {
    async fn execute(
        &self,
        lifecycle: &ClusterLifecycle,
        cluster_id: &str,
    ) -> std::result::Result<(), LifecycleError> {
        lifecycle.ensure_running(cluster_id).await
    }
}

/// Terminate cluster.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopCluster;

#[async_trait]
impl ClusterOperation for StopCluster {
    async fn execute(
        &self,
        lifecycle: &ClusterLifecycle,
        cluster_id: &str,
    ) -> std::result::Result<(), LifecycleError> {
        lifecycle.terminate(cluster_id).await
    }
}

/// Terminate cluster, then start it again.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestartCluster;

#[async_trait]
impl ClusterOperation for RestartCluster {
    async fn execute(
        &self,
        lifecycle: &ClusterLifecycle,
        cluster_id: &str,
    ) -> std::result::Result<(), LifecycleError> {
        lifecycle.restart(cluster_id).await
    }
}

impl ClusterOrchestrator {
    /// Control clusters by declared name.
    ///
    /// Names are resolved once up front. A name shared by several remote
    /// clusters controls all of them.
    ///
    /// # Errors
    ///
    /// - Return [`ClusterError::Remote`] if clusters cannot be listed.
    /// - Return [`ClusterError::NotFound`] if a name has no remote cluster.
    /// - Return [`ClusterError::Lifecycle`] if a cluster cannot be driven
    ///   into the state the command asks for.
    #[instrument(skip(self), level = "debug")]
    pub async fn control(&self, names: &[&str], command: ClusterCommand) -> Result<()> {
        let resolution = resolve_clusters(&*self.clusters, names)
            .await
            .map_err(|err| ClusterError::Remote {
                source: err,
                name: names.join(", "),
                command: "list",
            })?;
        if let Some(name) = resolution.missing.first() {
            return Err(ClusterError::NotFound { name: name.clone() });
        }

        let operation = command.operation();
        for cluster_id in &resolution.ids {
            info!("{command} cluster {cluster_id}");
            operation
                .execute(self.lifecycle(), cluster_id)
                .await
                .map_err(|err| ClusterError::Lifecycle {
                    source: err,
                    name: cluster_id.clone(),
                    command: command.as_str(),
                })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("start", ClusterCommand::Start; "start")]
    #[test_case("STOP", ClusterCommand::Stop; "stop uppercase")]
    #[test_case("Restart", ClusterCommand::Restart; "restart mixed case")]
    #[test]
    fn parse_cluster_command(input: &str, expect: ClusterCommand) -> anyhow::Result<()> {
        use pretty_assertions::assert_eq;
        let result: ClusterCommand = input.parse()?;
        assert_eq!(result, expect);
        assert_eq!(result.to_string(), input.to_ascii_lowercase());

        Ok(())
    }

    #[test]
    fn parse_unknown_cluster_command() {
        let result = "pause".parse::<ClusterCommand>();
        assert!(result.is_err());
    }
}
