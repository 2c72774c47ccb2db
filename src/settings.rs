// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Settings documents.
//!
//! A __settings document__ is the structured configuration of one declared
//! resource, either a job ([`JobSettings`]) or a cluster
//! ([`ClusterSettings`]). Documents are declared as JSON files next to the
//! project. Each file is a template that gets rendered against the
//! environment context first, and may hold a single document or an array of
//! them.
//!
//! # Partially and Fully Filled Documents
//!
//! A freshly loaded document is usually only partially filled. Empty
//! strings, empty collections, absent objects, and zero-valued numbers all
//! mean "unset" and are left for the merge engine to fill from defaults. Once
//! merged, every optional field holds either a concrete value or an explicit
//! absence.
//!
//! # Capabilities
//!
//! Code that only cares about one facet of a document is written against a
//! capability trait instead of a concrete document type:
//!
//! - [`HasResourceName`]: name used for remote lookups and validation.
//! - [`HasClusterName`]: name of a standalone cluster.
//! - [`HasArtifactPaths`]: archive libraries the document wants attached.
//!
//! [`JobSettings`]: crate::settings::job::JobSettings
//! [`ClusterSettings`]: crate::settings::cluster::ClusterSettings

pub mod cluster;
pub mod job;
pub mod library;
pub mod template;

use crate::{
    context::{ContextError, EnvironmentContext},
    settings::template::{TemplateError, TemplateRenderer},
};

use serde::{de::DeserializeOwned, Deserialize};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Document with a human readable resource name.
pub trait HasResourceName {
    /// Current resource name, possibly empty.
    fn resource_name(&self) -> &str;

    /// Replace resource name.
    fn set_resource_name(&mut self, name: String);
}

/// Document describing a standalone cluster.
pub trait HasClusterName {
    fn cluster_name(&self) -> &str;
}

/// Document with path-addressed archive libraries.
pub trait HasArtifactPaths {
    /// Declared archive library paths.
    fn artifact_paths(&self) -> Vec<&str>;
}

/// Check whether a numeric field holds its "unset" value.
pub(crate) fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Render and deserialize settings documents from text.
///
/// # Errors
///
/// - Return [`SettingsError::Context`] if template context cannot be built.
/// - Return [`SettingsError::Template`] if rendering fails.
/// - Return [`SettingsError::Deserialize`] if rendered text is malformed.
pub fn parse_settings<T>(
    source: impl Into<PathBuf>,
    text: &str,
    renderer: &dyn TemplateRenderer,
    context: &EnvironmentContext,
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let source = source.into();
    let rendered = renderer
        .render(text, &context.template_context()?)
        .map_err(|err| SettingsError::Template {
            source: err,
            path: source.clone(),
        })?;

    let documents = serde_json::from_str::<OneOrMany<T>>(&rendered).map_err(|err| {
        SettingsError::Deserialize {
            source: err,
            path: source.clone(),
        }
    })?;

    Ok(match documents {
        OneOrMany::Many(documents) => documents,
        OneOrMany::One(document) => vec![document],
    })
}

/// Load settings documents from a template file.
///
/// # Errors
///
/// - Return [`SettingsError::Read`] if settings file cannot be read.
/// - Return any error of [`parse_settings`].
#[instrument(skip(renderer, context), level = "debug")]
pub fn load_settings<T>(
    path: &Path,
    renderer: &dyn TemplateRenderer,
    context: &EnvironmentContext,
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    debug!("load settings from {:?}", path.display());
    let text = read_to_string(path).map_err(|err| SettingsError::Read {
        source: err,
        path: path.to_path_buf(),
    })?;

    parse_settings(path, &text, renderer, context)
}

/// Expand glob patterns into settings file paths.
///
/// Patterns without glob syntax pass through as is, so missing plain paths
/// surface as read errors later instead of silently matching nothing.
///
/// # Errors
///
/// - Return [`SettingsError::Pattern`] if a pattern is malformed.
/// - Return [`SettingsError::Glob`] if a matched path cannot be accessed.
/// - Return [`SettingsError::NoMatch`] if a glob pattern matches nothing.
pub fn expand_settings_paths(
    patterns: impl IntoIterator<Item = impl AsRef<str>>,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if !pattern.contains(['*', '?', '[']) {
            paths.push(PathBuf::from(pattern));
            continue;
        }

        let before = paths.len();
        for entry in glob::glob(pattern).map_err(|err| SettingsError::Pattern {
            source: err,
            pattern: pattern.to_string(),
        })? {
            paths.push(entry?);
        }

        if paths.len() == before {
            return Err(SettingsError::NoMatch {
                pattern: pattern.to_string(),
            });
        }
    }

    Ok(paths)
}

/// Settings loading error types.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Settings file cannot be read.
    #[error("failed to read settings file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Settings template cannot be rendered.
    #[error("failed to render settings template at {:?}", path.display())]
    Template {
        #[source]
        source: TemplateError,
        path: PathBuf,
    },

    /// Rendered settings are malformed.
    #[error("malformed settings at {:?}", path.display())]
    Deserialize {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Settings path pattern is malformed.
    #[error("invalid settings path pattern {pattern:?}")]
    Pattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },

    /// Settings path pattern matched nothing.
    #[error("settings path pattern {pattern:?} matched no files")]
    NoMatch { pattern: String },

    /// Matched settings path cannot be accessed.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),

    /// Template context cannot be built.
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Friendly result alias :3
pub type Result<T, E = SettingsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{
        cluster::ClusterSettings, job::JobSettings, template::JinjaRenderer,
    };
    use indoc::indoc;
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
    fn parse_array_of_rendered_documents() -> anyhow::Result<()> {
        let text = indoc! {r#"
            [
              { "name": "${team}/${artifact_id}/${environment}" },
              { "name": "${team}/${artifact_id}/backfill", "max_retries": 2 }
            ]
        "#};

        let result: Vec<JobSettings> =
            parse_settings("jobs.json", text, &JinjaRenderer::new()?, &context())?;
        let names = result.iter().map(|job| job.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["team1/my-artifact/qa", "team1/my-artifact/backfill"]);
        assert_eq!(result[1].max_retries, 2);

        Ok(())
    }

    #[test]
    fn parse_single_document() -> anyhow::Result<()> {
        let text = indoc! {r#"
            { "cluster_name": "team1/my-artifact", "artifact_paths": ["${artifact_path}"] }
        "#};

        let result: Vec<ClusterSettings> =
            parse_settings("cluster.json", text, &JinjaRenderer::new()?, &context())?;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].artifact_paths, vec!["dbfs:/libs/my-artifact-1.0.0.jar"]);

        Ok(())
    }

    #[test]
    fn parse_reports_malformed_document() -> anyhow::Result<()> {
        let result: Result<Vec<JobSettings>> =
            parse_settings("broken.json", "{ nope", &JinjaRenderer::new()?, &context());
        assert!(matches!(result, Err(SettingsError::Deserialize { .. })));

        Ok(())
    }

    #[test]
    fn parse_reports_missing_template_property() -> anyhow::Result<()> {
        let result: Result<Vec<JobSettings>> = parse_settings(
            "jobs.json",
            r#"{ "name": "${team}/${nope}" }"#,
            &JinjaRenderer::new()?,
            &context(),
        );
        assert!(matches!(result, Err(SettingsError::Template { .. })));

        Ok(())
    }

    #[test]
    fn expand_settings_paths_matches_globs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("a.json"), "{}")?;
        std::fs::write(dir.path().join("b.json"), "{}")?;
        std::fs::write(dir.path().join("c.txt"), "")?;

        let pattern = format!("{}/*.json", dir.path().display());
        let mut result = expand_settings_paths([pattern])?;
        result.sort();
        assert_eq!(result, vec![dir.path().join("a.json"), dir.path().join("b.json")]);

        let missing = format!("{}/*.yaml", dir.path().display());
        assert!(matches!(
            expand_settings_paths([missing]),
            Err(SettingsError::NoMatch { .. })
        ));

        Ok(())
    }
}
