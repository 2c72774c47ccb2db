// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Cluster upsert batches.
//!
//! See the [`crate::cluster`] module documentation for the state machine each
//! declared cluster goes through.

use crate::{
    cluster::{ClusterError, ClusterOrchestrator, Result},
    library::plan_libraries,
    resolve::resolve_cluster,
    settings::{cluster::ClusterSettings, HasArtifactPaths, HasClusterName},
};

use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use tokio::time::{timeout_at, Instant};
use tracing::{info, instrument, warn};

/// Final outcome of one batch entry.
#[derive(Debug)]
pub enum UpsertOutcome {
    /// No cluster of that name existed, so one was created.
    Created { cluster_id: String },

    /// Existing cluster was updated in place.
    Updated { cluster_id: String },

    /// Entry failed. Sibling entries are unaffected.
    Failed(ClusterError),

    /// Entry was still running at the batch deadline. It keeps running
    /// detached, but nobody waits for it anymore.
    Abandoned,
}

impl UpsertOutcome {
    /// Check whether entry converged.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Updated { .. })
    }

    /// Remote id of converged cluster.
    pub fn cluster_id(&self) -> Option<&str> {
        match self {
            Self::Created { cluster_id } | Self::Updated { cluster_id } => Some(cluster_id),
            _ => None,
        }
    }
}

/// Outcome of one batch entry, tagged with the declared name.
#[derive(Debug)]
pub struct ClusterReport {
    pub name: String,
    pub outcome: UpsertOutcome,
}

impl ClusterOrchestrator {
    /// Upsert batch of declared clusters.
    ///
    /// Declared clusters are merged and validated up front, so nothing remote
    /// happens if any of them is invalid. After that, every entry is upserted
    /// in its own task, and reported in declaration order.
    ///
    /// # Errors
    ///
    /// - Return any error of [`ClusterOrchestrator::prepare`].
    #[instrument(skip(self, declared), level = "debug")]
    pub async fn upsert_all(&self, declared: Vec<ClusterSettings>) -> Result<Vec<ClusterReport>> {
        let prepared = self.prepare(declared)?;
        Ok(self.upsert_prepared(prepared).await)
    }

    /// Upsert batch of already merged and validated clusters.
    pub async fn upsert_prepared(&self, prepared: Vec<ClusterSettings>) -> Vec<ClusterReport> {
        let duplicates = declared_duplicates(&prepared);
        let deadline = Instant::now() + self.batch_timeout;

        let entries = prepared.into_iter().map(|settings| {
            let name = settings.cluster_name().to_string();
            let this = self.clone();
            let duplicate = duplicates.contains(&name);
            async move {
                if duplicate {
                    let error = ClusterError::DuplicateDeclaration { name: name.clone() };
                    return report(name, UpsertOutcome::Failed(error));
                }

                let task = tokio::spawn(async move { this.upsert_one(settings).await });
                let outcome = match timeout_at(deadline, task).await {
                    Ok(Ok(Ok(outcome))) => outcome,
                    Ok(Ok(Err(error))) => UpsertOutcome::Failed(error),
                    Ok(Err(error)) => UpsertOutcome::Failed(ClusterError::Panicked {
                        source: error,
                        name: name.clone(),
                    }),
                    Err(_) => UpsertOutcome::Abandoned,
                };
                report(name, outcome)
            }
        });

        join_all(entries).await
    }

    /// Upsert single merged and validated cluster.
    ///
    /// # Errors
    ///
    /// - Return [`ClusterError::Remote`] if the cluster cannot be listed,
    ///   created, or edited.
    /// - Return [`ClusterError::Library`] if libraries cannot be queried,
    ///   detached, or attached.
    /// - Return [`ClusterError::Lifecycle`] if the cluster does not reach
    ///   running state.
    #[instrument(skip(self, settings), fields(cluster = %settings.cluster_name), level = "debug")]
    pub async fn upsert_one(&self, settings: ClusterSettings) -> Result<UpsertOutcome> {
        let name = settings.cluster_name().to_string();
        let existing = resolve_cluster(&*self.clusters, &name)
            .await
            .map_err(|err| remote(err, &name, "list"))?;

        match existing {
            None => self.create(&name, &settings).await,
            Some(cluster_id) => self.update(&name, cluster_id, &settings).await,
        }
    }

    async fn create(&self, name: &str, settings: &ClusterSettings) -> Result<UpsertOutcome> {
        let cluster_id = self
            .clusters
            .create(settings)
            .await
            .map_err(|err| remote(err, name, "create"))?;

        let plan = plan_libraries(&BTreeSet::new(), &settings.artifact_paths());
        if !plan.to_install.is_empty() {
            self.await_running(name, &cluster_id).await?;
            self.reconciler
                .attach(&cluster_id, &plan.to_install)
                .await
                .map_err(|err| library(err, name))?;
        }

        Ok(UpsertOutcome::Created { cluster_id })
    }

    async fn update(
        &self,
        name: &str,
        cluster_id: String,
        settings: &ClusterSettings,
    ) -> Result<UpsertOutcome> {
        let installed = self
            .reconciler
            .installed(&cluster_id)
            .await
            .map_err(|err| library(err, name))?;
        let plan = plan_libraries(&installed, &settings.artifact_paths());

        self.reconciler
            .detach(&cluster_id, &plan.to_remove)
            .await
            .map_err(|err| library(err, name))?;
        self.await_running(name, &cluster_id).await?;
        self.reconciler
            .attach(&cluster_id, &plan.to_install)
            .await
            .map_err(|err| library(err, name))?;

        self.clusters
            .edit(&cluster_id, settings)
            .await
            .map_err(|err| remote(err, name, "edit"))?;

        Ok(UpsertOutcome::Updated { cluster_id })
    }

    async fn await_running(&self, name: &str, cluster_id: &str) -> Result<()> {
        self.lifecycle()
            .ensure_running(cluster_id)
            .await
            .map_err(|err| ClusterError::Lifecycle {
                source: err,
                name: name.to_string(),
                command: "run",
            })
    }
}

fn report(name: String, outcome: UpsertOutcome) -> ClusterReport {
    match &outcome {
        UpsertOutcome::Created { cluster_id } => info!("created cluster {name:?} ({cluster_id})"),
        UpsertOutcome::Updated { cluster_id } => info!("updated cluster {name:?} ({cluster_id})"),
        UpsertOutcome::Failed(error) => warn!("failed cluster {name:?}: {error}"),
        UpsertOutcome::Abandoned => warn!("abandoned cluster {name:?} at batch deadline"),
    }

    ClusterReport { name, outcome }
}

fn declared_duplicates(declared: &[ClusterSettings]) -> BTreeSet<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for settings in declared {
        *counts.entry(settings.cluster_name()).or_default() += 1;
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect()
}

fn remote(source: crate::remote::RemoteError, name: &str, command: &'static str) -> ClusterError {
    ClusterError::Remote {
        source,
        name: name.to_string(),
        command,
    }
}

fn library(source: crate::library::LibraryError, name: &str) -> ClusterError {
    ClusterError::Library {
        source,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cluster(name: &str) -> ClusterSettings {
        ClusterSettings {
            cluster_name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn declared_duplicates_names_repeated_clusters() {
        let declared = vec![cluster("t/a/x"), cluster("t/a/y"), cluster("t/a/x")];
        let result = declared_duplicates(&declared);
        assert_eq!(result, BTreeSet::from(["t/a/x".to_string()]));
    }

    #[test]
    fn outcome_exposes_cluster_id() {
        let outcome = UpsertOutcome::Updated {
            cluster_id: "c1".into(),
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.cluster_id(), Some("c1"));
        assert_eq!(UpsertOutcome::Abandoned.cluster_id(), None);
    }
}
