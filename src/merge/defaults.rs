// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Default settings documents.
//!
//! Defaults are themselves settings templates. The built-in ones ship inside
//! the binary, and can be replaced by files named in the tool configuration.
//! They get rendered against the environment context once per process, so
//! the default library of a job is always the artifact of the invoking
//! project.

use crate::{
    context::EnvironmentContext,
    settings::{
        cluster::ClusterSettings, job::JobSettings, parse_settings, template::TemplateRenderer,
        SettingsError,
    },
};

use serde::de::DeserializeOwned;
use std::{fs::read_to_string, path::Path};
use tracing::{debug, instrument};

const BUILTIN_JOB: &str = include_str!("defaults/job.json");
const BUILTIN_CLUSTER: &str = include_str!("defaults/cluster.json");

/// Immutable fallback documents for every resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultsProvider {
    pub(crate) job: JobSettings,
    pub(crate) cluster: ClusterSettings,
}

impl DefaultsProvider {
    /// Construct provider from already parsed documents.
    pub fn from_documents(job: JobSettings, cluster: ClusterSettings) -> Self {
        Self { job, cluster }
    }

    /// Load defaults, preferring replacement files over built-in documents.
    ///
    /// # Errors
    ///
    /// - Return [`DefaultsError::Read`] if a replacement file cannot be read.
    /// - Return [`DefaultsError::Settings`] if a document cannot be rendered
    ///   or parsed.
    /// - Return [`DefaultsError::NotSingle`] if a document holds anything but
    ///   exactly one settings document.
    #[instrument(skip(renderer, context), level = "debug")]
    pub fn load(
        job_path: Option<&Path>,
        cluster_path: Option<&Path>,
        renderer: &dyn TemplateRenderer,
        context: &EnvironmentContext,
    ) -> Result<Self> {
        Ok(Self {
            job: load_single(job_path, BUILTIN_JOB, "builtin:job.json", renderer, context)?,
            cluster: load_single(
                cluster_path,
                BUILTIN_CLUSTER,
                "builtin:cluster.json",
                renderer,
                context,
            )?,
        })
    }

    /// Load built-in defaults only.
    ///
    /// # Errors
    ///
    /// - Return any error of [`DefaultsProvider::load`].
    pub fn builtin(renderer: &dyn TemplateRenderer, context: &EnvironmentContext) -> Result<Self> {
        Self::load(None, None, renderer, context)
    }

    /// Default job document.
    pub fn job(&self) -> &JobSettings {
        &self.job
    }

    /// Default cluster document.
    pub fn cluster(&self) -> &ClusterSettings {
        &self.cluster
    }
}

fn load_single<T: DeserializeOwned>(
    path: Option<&Path>,
    builtin: &str,
    builtin_name: &str,
    renderer: &dyn TemplateRenderer,
    context: &EnvironmentContext,
) -> Result<T> {
    let (source, text) = match path {
        Some(path) => {
            debug!("load defaults from {:?}", path.display());
            let text = read_to_string(path).map_err(|err| DefaultsError::Read {
                source: err,
                path: path.display().to_string(),
            })?;
            (path.display().to_string(), text)
        }
        None => (builtin_name.to_string(), builtin.to_string()),
    };

    let mut documents = parse_settings::<T>(source.as_str(), &text, renderer, context)?;
    if documents.len() != 1 {
        return Err(DefaultsError::NotSingle {
            source_name: source,
            count: documents.len(),
        });
    }

    Ok(documents.remove(0))
}

/// Default document error types.
#[derive(Debug, thiserror::Error)]
pub enum DefaultsError {
    /// Replacement defaults file cannot be read.
    #[error("failed to read defaults file at {path:?}")]
    Read {
        #[source]
        source: std::io::Error,
        path: String,
    },

    /// Defaults must hold exactly one document.
    #[error("defaults at {source_name:?} hold {count} documents instead of one")]
    NotSingle { source_name: String, count: usize },

    /// Defaults cannot be rendered or parsed.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Friendly result alias :3
pub type Result<T, E = DefaultsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{library::Library, template::JinjaRenderer};
    use pretty_assertions::assert_eq;

    fn context() -> EnvironmentContext {
        EnvironmentContext {
            group_id: "com.example.team1".into(),
            artifact_id: "my-artifact".into(),
            version: "1.0.0".into(),
            environment: "qa".into(),
            artifact_path: "dbfs:/libs/my-artifact-1.0.0.jar".into(),
            prefix_to_strip: r"com\.example\.".into(),
        }
    }

    #[test]
    fn builtin_defaults_point_at_project_artifact() -> anyhow::Result<()> {
        let defaults = DefaultsProvider::builtin(&JinjaRenderer::new()?, &context())?;

        assert_eq!(
            defaults.job().libraries,
            vec![Library::archive("dbfs:/libs/my-artifact-1.0.0.jar")]
        );
        assert_eq!(defaults.cluster().artifact_paths, vec!["dbfs:/libs/my-artifact-1.0.0.jar"]);
        let env = defaults.cluster().spec.spark_env_vars.get("DEPLOY_ENVIRONMENT");
        assert_eq!(env.map(String::as_str), Some("qa"));
        assert!(defaults.job().new_cluster.is_some());

        Ok(())
    }

    #[test]
    fn replacement_defaults_must_be_single() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("job.json");
        std::fs::write(&path, r#"[{ "timeout_seconds": 1 }, { "timeout_seconds": 2 }]"#)?;

        let result =
            DefaultsProvider::load(Some(&path), None, &JinjaRenderer::new()?, &context());
        assert!(matches!(result, Err(DefaultsError::NotSingle { count: 2, .. })));

        std::fs::write(&path, r#"{ "timeout_seconds": 42 }"#)?;
        let result =
            DefaultsProvider::load(Some(&path), None, &JinjaRenderer::new()?, &context())?;
        assert_eq!(result.job().timeout_seconds, 42);

        Ok(())
    }
}
