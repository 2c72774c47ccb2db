// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Library reconciliation.
//!
//! Converges the archive libraries installed on a cluster to a desired set.
//! Libraries are compared by exact path, so a new version uploaded to the
//! same path is no change at all, while a changed path always means removing
//! the old archive and installing the new one.
//!
//! # Cluster State
//!
//! Libraries can only be attached to or detached from a running cluster, and
//! changes only take effect once the cluster restarts. Reconciling thus
//! drives the cluster through its state machine:
//!
//! 1. Record whether the cluster is active.
//! 2. Make sure it is running.
//! 3. Detach stale libraries, then attach missing ones.
//! 4. Restart a cluster that was active, so the changes take effect. A
//!    cluster that was not active gets terminated again.
//!
//! Reconciling a cluster that already has the desired libraries does not
//! touch its state at all.

use crate::{
    lifecycle::{ClusterLifecycle, LifecycleError},
    remote::{
        model::{LibraryFullStatus, LibraryInstallStatus},
        LibraryService, RemoteError,
    },
    settings::library::{is_archive_path, Library},
};

use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, info, instrument, warn};

/// Changes needed to converge installed libraries to a desired set.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct LibraryPlan {
    /// Desired archives not installed yet.
    pub to_install: Vec<String>,

    /// Installed archives no longer desired.
    pub to_remove: Vec<String>,

    /// Desired entries that cannot be reconciled.
    pub rejected: Vec<String>,
}

impl LibraryPlan {
    /// Check whether plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_remove.is_empty()
    }
}

/// Plan changes from installed archives to desired archives.
///
/// Desired entries that do not name an archive are rejected with a warning
/// instead of failing the whole plan. Duplicate desired entries are planned
/// once.
pub fn plan_libraries<S: AsRef<str>>(installed: &BTreeSet<String>, desired: &[S]) -> LibraryPlan {
    let mut plan = LibraryPlan::default();
    let mut wanted = BTreeSet::new();

    for path in desired.iter().map(AsRef::as_ref) {
        if !is_archive_path(path) {
            warn!("skip library {path:?}, only archive libraries can be reconciled");
            plan.rejected.push(path.to_string());
            continue;
        }

        if !wanted.insert(path) {
            continue;
        }

        if installed.contains(path) {
            debug!("library {path:?} already installed");
        } else {
            plan.to_install.push(path.to_string());
        }
    }

    plan.to_remove = installed
        .iter()
        .filter(|path| !wanted.contains(path.as_str()))
        .cloned()
        .collect();

    plan
}

/// Archive libraries managed on a cluster.
///
/// Libraries installed on every cluster are not managed per cluster, and
/// libraries already marked for removal on restart are as good as gone, so
/// both are left out.
pub fn installed_archives(statuses: &[LibraryFullStatus]) -> BTreeSet<String> {
    statuses
        .iter()
        .filter(|status| !status.is_library_for_all_clusters)
        .filter(|status| status.status != LibraryInstallStatus::UninstallOnRestart)
        .filter_map(|status| status.library.archive_path())
        .map(ToString::to_string)
        .collect()
}

/// Converge archive libraries of clusters.
#[derive(Clone)]
pub struct LibraryReconciler {
    lifecycle: ClusterLifecycle,
    libraries: Arc<dyn LibraryService>,
    restart: bool,
}

impl LibraryReconciler {
    /// Construct new reconciler that restarts clusters after changes.
    pub fn new(lifecycle: ClusterLifecycle, libraries: Arc<dyn LibraryService>) -> Self {
        Self {
            lifecycle,
            libraries,
            restart: true,
        }
    }

    /// Toggle whether active clusters are restarted after library changes.
    pub fn restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }

    pub fn lifecycle(&self) -> &ClusterLifecycle {
        &self.lifecycle
    }

    /// Archive libraries currently managed on cluster.
    ///
    /// # Errors
    ///
    /// - Return [`LibraryError::Remote`] if library status cannot be queried.
    pub async fn installed(&self, cluster_id: &str) -> Result<BTreeSet<String>> {
        let statuses = self
            .libraries
            .cluster_status(cluster_id)
            .await
            .map_err(|err| LibraryError::Remote {
                source: err,
                cluster_id: cluster_id.to_string(),
                command: "query libraries of",
            })?;
        Ok(installed_archives(&statuses))
    }

    /// Reconcile archive libraries of cluster against desired paths.
    ///
    /// Returns the plan that was carried out.
    ///
    /// # Errors
    ///
    /// - Return [`LibraryError::Remote`] if libraries cannot be queried,
    ///   detached, or attached.
    /// - Return [`LibraryError::Lifecycle`] if the cluster cannot be driven
    ///   into or out of running state.
    #[instrument(skip(self, desired), level = "debug")]
    pub async fn reconcile<S>(&self, cluster_id: &str, desired: &[S]) -> Result<LibraryPlan>
    where
        S: AsRef<str> + Sync,
    {
        let installed = self.installed(cluster_id).await?;
        let plan = plan_libraries(&installed, desired);
        if plan.is_empty() {
            info!("libraries of cluster {cluster_id} are up to date");
            return Ok(plan);
        }

        let was_active = self.lifecycle.state(cluster_id).await?.is_active();
        self.lifecycle.ensure_running(cluster_id).await?;
        self.detach(cluster_id, &plan.to_remove).await?;
        self.attach(cluster_id, &plan.to_install).await?;

        if was_active {
            if self.restart {
                self.lifecycle.restart(cluster_id).await?;
            } else {
                warn!("cluster {cluster_id} needs a restart for library changes to take effect");
            }
        } else {
            self.lifecycle.terminate(cluster_id).await?;
        }

        Ok(plan)
    }

    /// Install archive libraries on running cluster.
    ///
    /// # Errors
    ///
    /// - Return [`LibraryError::Remote`] if install call fails.
    pub async fn attach(&self, cluster_id: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        info!("install libraries {paths:?} on cluster {cluster_id}");
        self.libraries
            .install(cluster_id, &archives(paths))
            .await
            .map_err(|err| LibraryError::Remote {
                source: err,
                cluster_id: cluster_id.to_string(),
                command: "install libraries on",
            })
    }

    /// Uninstall archive libraries from running cluster.
    ///
    /// # Errors
    ///
    /// - Return [`LibraryError::Remote`] if uninstall call fails.
    pub async fn detach(&self, cluster_id: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        info!("uninstall libraries {paths:?} from cluster {cluster_id}");
        self.libraries
            .uninstall(cluster_id, &archives(paths))
            .await
            .map_err(|err| LibraryError::Remote {
                source: err,
                cluster_id: cluster_id.to_string(),
                command: "uninstall libraries from",
            })
    }
}

fn archives(paths: &[String]) -> Vec<Library> {
    paths.iter().map(Library::archive).collect()
}

/// Library reconciliation error types.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// Library call to cluster failed.
    #[error("failed to {command} cluster {cluster_id}")]
    Remote {
        #[source]
        source: RemoteError,
        cluster_id: String,
        command: &'static str,
    },

    /// Cluster cannot be driven through its states.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Friendly result alias :3
pub type Result<T, E = LibraryError> = std::result::Result<T, E>;
