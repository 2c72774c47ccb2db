// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Environment context of an invocation.
//!
//! The __environment context__ identifies the project that invoked Brickyard:
//! its group id, artifact id, and version, the deployment environment being
//! targeted, and the storage path of the artifact the project produced.
//!
//! # Two-Phase Initialization
//!
//! A context is normally built once from the project and stays read-only for
//! the rest of the invocation. However, deployments are often split in two:
//! the build produces the artifact and freezes the facts about it, and some
//! later detached run (no project around anymore) pushes it to a given
//! environment. To support this, a context can be persisted as JSON with
//! [`EnvironmentContext::save`], reloaded with [`EnvironmentContext::load`],
//! and only then given the environment it should target through
//! [`EnvironmentContext::with_environment`].
//!
//! # Team Identifier
//!
//! Group ids tend to carry a company prefix, e.g., `com.example.team1`. The
//! __team identifier__ is whatever remains of the group id after stripping that
//! prefix, which is described by a regular expression. It acts as the
//! namespace of every declared resource name and as the ownership tag of
//! every cluster.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Identity and target environment of the invoking project.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct EnvironmentContext {
    /// Group id of the project, e.g., `com.example.team1`.
    pub group_id: String,

    /// Artifact id of the project.
    pub artifact_id: String,

    /// Version of the project.
    pub version: String,

    /// Deployment environment, e.g., `qa` or `prod`.
    #[serde(default)]
    pub environment: String,

    /// Storage path of the built artifact.
    pub artifact_path: String,

    /// Regular expression matching the company prefix of the group id.
    #[serde(default)]
    pub prefix_to_strip: String,
}

impl EnvironmentContext {
    /// Derive team identifier from group id.
    ///
    /// Strips the first match of the company prefix pattern from the group
    /// id. An empty pattern leaves the group id untouched.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::PrefixPattern`] if prefix pattern is not a
    ///   valid regular expression.
    pub fn team(&self) -> Result<String> {
        derive_team(&self.group_id, &self.prefix_to_strip)
    }

    /// Default resource name, i.e., `{team}/{artifact_id}`.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::PrefixPattern`] if prefix pattern is not a
    ///   valid regular expression.
    pub fn default_resource_name(&self) -> Result<String> {
        Ok(format!("{}/{}", self.team()?, self.artifact_id))
    }

    /// Replace the environment being targeted.
    ///
    /// Meant for the second phase of initialization after a reload.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Object handed to the template renderer.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::PrefixPattern`] if team cannot be derived.
    pub fn template_context(&self) -> Result<serde_json::Value> {
        Ok(json!({
            "group_id": self.group_id,
            "artifact_id": self.artifact_id,
            "version": self.version,
            "environment": self.environment,
            "artifact_path": self.artifact_path,
            "team": self.team()?,
        }))
    }

    /// Persist context as JSON at target path.
    ///
    /// Creates any missing parent directories.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::Serialize`] if context cannot be serialized.
    /// - Return [`ContextError::Write`] if context file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("persist environment context to {:?}", path.display());
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            mkdirp::mkdirp(parent).map_err(|err| ContextError::Write {
                source: err,
                path: path.to_path_buf(),
            })?;
        }

        let data = serde_json::to_string_pretty(self).map_err(ContextError::Serialize)?;
        write(path, data).map_err(|err| ContextError::Write {
            source: err,
            path: path.to_path_buf(),
        })?;

        Ok(())
    }

    /// Load persisted context from target path.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::Read`] if context file cannot be read.
    /// - Return [`ContextError::Deserialize`] if context file is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("load environment context from {:?}", path.display());
        let data = read_to_string(path).map_err(|err| ContextError::Read {
            source: err,
            path: path.to_path_buf(),
        })?;

        serde_json::from_str(&data).map_err(|err| ContextError::Deserialize {
            source: err,
            path: path.to_path_buf(),
        })
    }
}

/// Strip company prefix pattern from group id.
///
/// # Errors
///
/// - Return [`ContextError::PrefixPattern`] if prefix pattern is not a
///   valid regular expression.
pub fn derive_team(group_id: &str, prefix_to_strip: &str) -> Result<String> {
    if prefix_to_strip.is_empty() {
        return Ok(group_id.to_string());
    }

    let pattern = Regex::new(prefix_to_strip).map_err(|err| ContextError::PrefixPattern {
        source: err,
        pattern: prefix_to_strip.to_string(),
    })?;

    Ok(pattern.replace(group_id, "").into_owned())
}

/// Environment context error types.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Company prefix pattern is not a valid regular expression.
    #[error("invalid prefix pattern {pattern:?}")]
    PrefixPattern {
        #[source]
        source: regex::Error,
        pattern: String,
    },

    /// Context cannot be serialized.
    #[error("failed to serialize environment context")]
    Serialize(#[source] serde_json::Error),

    /// Persisted context is malformed.
    #[error("malformed environment context at {:?}", path.display())]
    Deserialize {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Context file cannot be read.
    #[error("failed to read environment context at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Context file cannot be written.
    #[error("failed to write environment context at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ContextError> = std::result::Result<T, E>;
