// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that Brickyard reads its
//! workspace, project, and behavior options from. Parsing goes through
//! [`FromStr`], printing through [`Display`].
//!
//! # General Layout
//!
//! ```toml
//! [workspace]
//! host = "https://$WORKSPACE.cloud.databricks.com"
//! token_env = "DATABRICKS_TOKEN"
//!
//! [project]
//! group_id = "com.example.team1"
//! artifact_id = "my-artifact"
//! version = "1.0.0"
//! artifact_path = "dbfs:/libs/my-artifact-1.0.0.jar"
//! prefix_to_strip = "com\\.example\\."
//! environment = "qa"
//!
//! [options]
//! skip_validation = false
//! poll_interval_secs = 10
//! ```
//!
//! Without a `[project]` table Brickyard runs standalone, and reads the
//! environment context persisted by an earlier `prepare` run instead.
//!
//! The workspace host and every path are shell expanded, so environment
//! variables and `~` can be used in them. The API token itself never appears
//! in the file. Only the name of the environment variable holding it does.

use crate::context::EnvironmentContext;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::{debug, instrument};

/// Default environment variable holding the API token.
pub const DEFAULT_TOKEN_ENV: &str = "DATABRICKS_TOKEN";

/// Tool configuration layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Workspace to talk to.
    pub workspace: WorkspaceConfig,

    /// Project declaring the resources. Absent in standalone mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectConfig>,

    /// Behavior options.
    #[serde(default)]
    pub options: Options,
}

impl Config {
    /// Load configuration file at path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return any error of [`Config::from_str`].
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        debug!("load configuration from {:?}", path.as_ref().display());
        read_to_string(path.as_ref())
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.as_ref().display().to_string(),
            })?
            .parse()
    }

    /// API token read from the configured environment variable.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::MissingToken`] if variable is unset or blank.
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.workspace.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingToken {
                variable: self.workspace.token_env.clone(),
            })
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on host and every path.
        config.workspace.host = expand(&config.workspace.host)?;
        if config.workspace.host.trim().is_empty() {
            return Err(ConfigError::MissingProperty {
                property: "workspace.host",
            });
        }

        let options = &mut config.options;
        for path in [
            &mut options.context_file,
            &mut options.job_defaults,
            &mut options.cluster_defaults,
        ]
        .into_iter()
        .flatten()
        {
            let expanded = expand(&path.to_string_lossy())?;
            *path = PathBuf::from(expanded);
        }

        if let Some(project) = &config.project {
            for (property, value) in [
                ("project.group_id", &project.group_id),
                ("project.artifact_id", &project.artifact_id),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::MissingProperty { property });
                }
            }
        }

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(text: &str) -> Result<String> {
    Ok(shellexpand::full(text)
        .map_err(ConfigError::ShellExpansion)?
        .into_owned())
}

/// Workspace connection settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Base URL of the workspace.
    pub host: String,

    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            host: String::default(),
            token_env: default_token_env(),
        }
    }
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.into()
}

/// Facts about the project declaring the resources.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub group_id: String,
    pub artifact_id: String,

    #[serde(default)]
    pub version: String,

    /// Storage path the project artifact gets uploaded to.
    #[serde(default)]
    pub artifact_path: String,

    /// Pattern stripped off the group id to derive the team.
    #[serde(default)]
    pub prefix_to_strip: String,

    /// Deployment environment, e.g., "qa" or "prod".
    #[serde(default)]
    pub environment: String,
}

impl ProjectConfig {
    /// Environment context of project.
    pub fn context(&self) -> EnvironmentContext {
        EnvironmentContext {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: self.version.clone(),
            environment: self.environment.clone(),
            artifact_path: self.artifact_path.clone(),
            prefix_to_strip: self.prefix_to_strip.clone(),
        }
    }
}

/// Behavior options.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Options {
    /// Skip validation of merged settings altogether.
    pub skip_validation: bool,

    /// Fail job lookups when several jobs share a name.
    pub fail_on_duplicate_job_name: bool,

    /// Restart active clusters after library changes.
    pub restart_after_library_change: bool,

    pub poll_interval_secs: u64,

    /// Ceiling on how long a cluster batch waits for its entries.
    pub batch_timeout_secs: u64,

    pub run_page_size: u32,

    /// Pattern restricting job control commands to matching job names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_name_filter: Option<String>,

    /// Location of persisted environment context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_file: Option<PathBuf>,

    /// Replacement for the built-in default job document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_defaults: Option<PathBuf>,

    /// Replacement for the built-in default cluster document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_defaults: Option<PathBuf>,
}

impl Options {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    /// Compiled job name filter.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Pattern`] if filter is not a valid pattern.
    pub fn job_name_filter(&self) -> Result<Option<Regex>> {
        self.job_name_filter
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| ConfigError::Pattern {
                    source: err,
                    pattern: pattern.to_string(),
                })
            })
            .transpose()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            skip_validation: false,
            fail_on_duplicate_job_name: true,
            restart_after_library_change: true,
            poll_interval_secs: 10,
            batch_timeout_secs: 15 * 60,
            run_page_size: 25,
            job_name_filter: None,
            context_file: None,
            job_defaults: None,
            cluster_defaults: None,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file at {path:?}")]
    Read {
        #[source]
        source: std::io::Error,
        path: String,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Mandatory property is missing or blank.
    #[error("configuration property {property} must be set")]
    MissingProperty { property: &'static str },

    /// API token variable is unset.
    #[error("environment variable {variable} must hold the workspace API token")]
    MissingToken { variable: String },

    /// Job name filter is not a valid pattern.
    #[error("invalid job name filter {pattern:?}")]
    Pattern {
        #[source]
        source: regex::Error,
        pattern: String,
    },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
