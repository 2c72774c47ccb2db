// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Invocation wiring.
//!
//! A [`Workspace`] ties together everything a single invocation needs: the
//! tool configuration, the environment context, the default documents
//! rendered against that context, and the merger and validator built on top
//! of them. Orchestrators are handed out on demand over whatever remote
//! services the caller provides, so the same wiring serves the REST client as
//! well as in-memory fakes.
//!
//! # Project and Standalone Mode
//!
//! In project mode the environment context comes straight from the
//! `[project]` table of the configuration, and declared names are validated
//! against that project. In standalone mode there is no project. The context
//! is loaded from the file an earlier `prepare` wrote, and declared names are
//! validated against externally supplied overrides instead (see
//! [`crate::validate`]). Either way the targeted environment can be replaced
//! for the current invocation.

use crate::{
    cluster::ClusterOrchestrator,
    config::{Config, ConfigError},
    context::{ContextError, EnvironmentContext},
    converge::WaitPolicy,
    job::JobOrchestrator,
    library::LibraryReconciler,
    lifecycle::ClusterLifecycle,
    merge::{
        defaults::{DefaultsError, DefaultsProvider},
        DefaultMerger,
    },
    path::default_context_file,
    remote::{rest::RestClient, ClusterService, JobService, LibraryService},
    settings::{
        cluster::ClusterSettings,
        expand_settings_paths,
        job::JobSettings,
        load_settings,
        template::{JinjaRenderer, TemplateError, TemplateRenderer},
        SettingsError,
    },
    validate::{ValidationError, ValidationTarget, Validator},
};

use serde::de::DeserializeOwned;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Per-invocation overrides of the configuration.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Environment to target instead of the configured one.
    pub environment: Option<String>,

    /// Ignore any configured project and run standalone.
    pub standalone: bool,

    /// Location of persisted environment context.
    pub context_file: Option<PathBuf>,
}

/// Everything a single invocation needs.
pub struct Workspace {
    config: Config,
    context: Arc<EnvironmentContext>,
    context_file: PathBuf,
    standalone: bool,
    renderer: Arc<dyn TemplateRenderer>,
    merger: DefaultMerger,
    validator: Validator,
    cancel: CancellationToken,
}

impl Workspace {
    /// Open workspace for invocation.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Template`] if the template engine cannot be
    ///   set up.
    /// - Return [`WorkspaceError::Context`] if persisted context cannot be
    ///   loaded in standalone mode.
    /// - Return [`WorkspaceError::Defaults`] if default documents cannot be
    ///   loaded.
    /// - Return [`WorkspaceError::Validation`] if the validation target cannot
    ///   be determined.
    #[instrument(skip(config, invocation), level = "debug")]
    pub fn open(config: Config, invocation: &Invocation) -> Result<Self> {
        Self::with_renderer(config, invocation, Arc::new(JinjaRenderer::new()?))
    }

    /// Open workspace for invocation with custom template renderer.
    ///
    /// # Errors
    ///
    /// - Return any error of [`Workspace::open`].
    pub fn with_renderer(
        config: Config,
        invocation: &Invocation,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Result<Self> {
        let context_file = invocation
            .context_file
            .clone()
            .or_else(|| config.options.context_file.clone())
            .unwrap_or_else(default_context_file);

        let project = config.project.as_ref().filter(|_| !invocation.standalone);
        let standalone = project.is_none();
        let mut context = match project {
            Some(project) => project.context(),
            None => {
                info!("run standalone with context from {:?}", context_file.display());
                EnvironmentContext::load(&context_file)?
            }
        };
        if let Some(environment) = &invocation.environment {
            context = context.with_environment(environment.as_str());
        }
        if context.environment.is_empty() {
            warn!("no deployment environment set");
        }

        let defaults = DefaultsProvider::load(
            config.options.job_defaults.as_deref(),
            config.options.cluster_defaults.as_deref(),
            &*renderer,
            &context,
        )?;

        let target = if standalone {
            ValidationTarget::from_overrides(&context.prefix_to_strip)
        } else {
            ValidationTarget::from_context(&context)
        };
        let target = match target {
            Ok(target) => target,
            // INVARIANT: Overrides only matter when validation actually runs.
            Err(_) if config.options.skip_validation => ValidationTarget {
                team: String::new(),
                artifact_id: String::new(),
            },
            Err(err) => return Err(err.into()),
        };
        let validator = Validator::new(target).skip(config.options.skip_validation);

        let context = Arc::new(context);
        let merger = DefaultMerger::new(Arc::new(defaults), context.clone());

        Ok(Self {
            config,
            context,
            context_file,
            standalone,
            renderer,
            merger,
            validator,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &EnvironmentContext {
        &self.context
    }

    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    pub fn merger(&self) -> &DefaultMerger {
        &self.merger
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Persist environment context for a later standalone invocation.
    ///
    /// Returns the path the context was written to.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::NoProject`] if running standalone.
    /// - Return [`WorkspaceError::Context`] if context cannot be written.
    pub fn prepare(&self) -> Result<&Path> {
        if self.standalone {
            return Err(WorkspaceError::NoProject);
        }

        self.context.save(&self.context_file)?;
        Ok(&self.context_file)
    }

    /// Load declared jobs from settings files matching patterns.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Settings`] if a settings file cannot be
    ///   found, read, rendered, or parsed.
    pub fn load_jobs(&self, patterns: &[String]) -> Result<Vec<JobSettings>> {
        self.load(patterns)
    }

    /// Load declared clusters from settings files matching patterns.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Settings`] if a settings file cannot be
    ///   found, read, rendered, or parsed.
    pub fn load_clusters(&self, patterns: &[String]) -> Result<Vec<ClusterSettings>> {
        self.load(patterns)
    }

    fn load<T: DeserializeOwned>(&self, patterns: &[String]) -> Result<Vec<T>> {
        let mut documents = Vec::new();
        for path in expand_settings_paths(patterns)? {
            documents.extend(load_settings::<T>(&path, &*self.renderer, &self.context)?);
        }

        Ok(documents)
    }

    /// Connect to the configured workspace over REST.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Config`] if the API token is not set.
    pub fn connect(&self) -> Result<Arc<RestClient>> {
        let token = self.config.token()?;
        Ok(Arc::new(RestClient::new(&self.config.workspace.host, token)))
    }

    /// Token cancelling every wait of this workspace.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait policy following the configured poll interval.
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(self.config.options.poll_interval()).with_cancel(self.cancel.clone())
    }

    /// Cluster orchestrator over remote services.
    pub fn cluster_orchestrator(
        &self,
        clusters: Arc<dyn ClusterService>,
        libraries: Arc<dyn LibraryService>,
    ) -> ClusterOrchestrator {
        let options = &self.config.options;
        ClusterOrchestrator::new(
            clusters,
            libraries,
            self.merger.clone(),
            self.validator.clone(),
            self.wait_policy(),
        )
        .batch_timeout(options.batch_timeout())
        .restart_after_library_change(options.restart_after_library_change)
    }

    /// Job orchestrator over remote job service.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Config`] if the job name filter is not a
    ///   valid pattern.
    pub fn job_orchestrator(&self, jobs: Arc<dyn JobService>) -> Result<JobOrchestrator> {
        let options = &self.config.options;
        Ok(JobOrchestrator::new(
            jobs,
            self.merger.clone(),
            self.validator.clone(),
            self.wait_policy(),
        )
        .fail_on_duplicate(options.fail_on_duplicate_job_name)
        .name_filter(options.job_name_filter()?)
        .page_size(options.run_page_size))
    }

    /// Library reconciler over remote services.
    pub fn library_reconciler(
        &self,
        clusters: Arc<dyn ClusterService>,
        libraries: Arc<dyn LibraryService>,
    ) -> LibraryReconciler {
        let lifecycle = ClusterLifecycle::new(clusters, self.wait_policy());
        LibraryReconciler::new(lifecycle, libraries)
            .restart(self.config.options.restart_after_library_change)
    }
}

/// Workspace wiring error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Configuration is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Environment context cannot be loaded or persisted.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Default documents cannot be loaded.
    #[error(transparent)]
    Defaults(#[from] DefaultsError),

    /// Validation target cannot be determined.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Template engine cannot be set up.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Declared settings cannot be loaded.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Operation needs a project, but none is configured.
    #[error("operation requires a [project] table in the configuration")]
    NoProject,
}

/// Friendly result alias :3
pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;
