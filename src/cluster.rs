// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Cluster orchestration.
//!
//! A __declared cluster__ is a cluster settings document shipped with a
//! project. Brickyard converges the remote side to the declared clusters by
//! name: a declared cluster without remote counterpart gets created, one
//! with a remote counterpart gets updated in place.
//!
//! # Upsert State Machine
//!
//! Every declared cluster goes through the following states on its own:
//!
//! ```text
//! RESOLVE --none--> CREATE --> ATTACH
//!    |
//!    +--found--> DETACH --> RUNNING --> ATTACH --> EDIT
//! ```
//!
//! - __RESOLVE__: look up the remote id by declared name.
//! - __CREATE__: create the cluster from its merged settings. Nothing is
//!   installed on a fresh cluster, so every declared library gets attached
//!   once the cluster is up.
//! - __DETACH__: uninstall libraries no longer declared.
//! - __RUNNING__: make sure the cluster runs, starting it if terminated.
//! - __ATTACH__: install declared libraries missing from the cluster.
//! - __EDIT__: replace remote settings with the merged settings.
//!
//! # Batches
//!
//! Declared clusters are upserted as one batch, each entry in its own task.
//! The batch waits for all entries up to a deadline. Entries still running at
//! the deadline are reported as abandoned, but keep running detached, so
//! remote mutations they already issued are never rolled back. One failing
//! entry never fails its siblings.
//!
//! # See Also
//!
//! 1. [`upsert`]
//! 2. [`control`]
//! 3. [`crate::library`]

pub mod control;
pub mod upsert;

use crate::{
    converge::WaitPolicy,
    library::{LibraryError, LibraryReconciler},
    lifecycle::{ClusterLifecycle, LifecycleError},
    merge::{DefaultMerger, MergeError},
    remote::{ClusterService, LibraryService, RemoteError},
    settings::cluster::ClusterSettings,
    validate::{ValidationError, Validator},
};

use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument};

/// Default ceiling on how long a batch waits for its entries.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Converge remote clusters to declared clusters.
#[derive(Clone)]
pub struct ClusterOrchestrator {
    pub(crate) clusters: Arc<dyn ClusterService>,
    pub(crate) reconciler: LibraryReconciler,
    pub(crate) merger: DefaultMerger,
    pub(crate) validator: Validator,
    pub(crate) batch_timeout: Duration,
}

impl ClusterOrchestrator {
    /// Construct new cluster orchestrator.
    ///
    /// Libraries are reconciled through the given library service, and active
    /// clusters get restarted after library changes unless told otherwise
    /// through [`ClusterOrchestrator::restart_after_library_change`].
    pub fn new(
        clusters: Arc<dyn ClusterService>,
        libraries: Arc<dyn LibraryService>,
        merger: DefaultMerger,
        validator: Validator,
        policy: WaitPolicy,
    ) -> Self {
        let lifecycle = ClusterLifecycle::new(clusters.clone(), policy);
        Self {
            clusters,
            reconciler: LibraryReconciler::new(lifecycle, libraries),
            merger,
            validator,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }

    /// Set ceiling on how long a batch waits for its entries.
    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Toggle whether active clusters restart after library changes.
    pub fn restart_after_library_change(mut self, restart: bool) -> Self {
        self.reconciler = self.reconciler.restart(restart);
        self
    }

    pub fn reconciler(&self) -> &LibraryReconciler {
        &self.reconciler
    }

    pub fn lifecycle(&self) -> &ClusterLifecycle {
        self.reconciler.lifecycle()
    }

    /// Merge and validate declared clusters.
    ///
    /// # Errors
    ///
    /// - Return [`ClusterError::Merge`] if defaults cannot be merged.
    /// - Return [`ClusterError::Validation`] if a merged cluster is invalid.
    #[instrument(skip(self, declared), level = "debug")]
    pub fn prepare(&self, declared: Vec<ClusterSettings>) -> Result<Vec<ClusterSettings>> {
        declared
            .into_iter()
            .map(|document| -> Result<ClusterSettings> {
                let merged = self.merger.merge_cluster(document)?;
                debug!(
                    "merged cluster {:?} with {} defaults",
                    merged.document.cluster_name,
                    merged.fills.len()
                );
                self.validator.validate_cluster(&merged.document)?;
                Ok(merged.document)
            })
            .collect()
    }
}

/// Cluster orchestration error types.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Defaults cannot be merged into declared cluster.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Merged cluster is invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Several entries of one batch declare the same cluster.
    #[error("cluster {name:?} is declared more than once in the same batch")]
    DuplicateDeclaration { name: String },

    /// No remote cluster has the declared name.
    #[error("no cluster named {name:?}")]
    NotFound { name: String },

    /// Cluster call failed.
    #[error("failed to {command} cluster {name:?}")]
    Remote {
        #[source]
        source: RemoteError,
        name: String,
        command: &'static str,
    },

    /// Libraries of cluster cannot be reconciled.
    #[error("failed to reconcile libraries of cluster {name:?}")]
    Library {
        #[source]
        source: LibraryError,
        name: String,
    },

    /// Cluster cannot be driven through its states.
    #[error("failed to {command} cluster {name:?}")]
    Lifecycle {
        #[source]
        source: LifecycleError,
        name: String,
        command: &'static str,
    },

    /// Upsert task of cluster died.
    #[error("upsert of cluster {name:?} panicked")]
    Panicked {
        #[source]
        source: tokio::task::JoinError,
        name: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ClusterError> = std::result::Result<T, E>;
