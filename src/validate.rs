// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Settings validation.
//!
//! Merged settings documents are checked against the project that declares
//! them before anything remote happens:
//!
//! - Resource names must look like `{team}/{artifact_id}/...`, so the first
//!   segment names the owning team and the second the declaring artifact.
//! - Jobs must notify someone when a run fails.
//!
//! Validation can be skipped altogether through configuration.
//!
//! # Standalone Mode
//!
//! Without an enclosing project, the expected team and artifact cannot come
//! from the project itself. Instead they are read from the
//! [`GROUP_ID_OVERRIDE`] and [`ARTIFACT_ID_OVERRIDE`] environment variables.

use crate::{
    context::{derive_team, ContextError, EnvironmentContext},
    settings::{cluster::ClusterSettings, job::JobSettings, HasResourceName},
};

use tracing::{debug, warn};

/// Environment variable overriding expected group id in standalone mode.
pub const GROUP_ID_OVERRIDE: &str = "BRICKYARD_GROUP_ID";

/// Environment variable overriding expected artifact id in standalone mode.
pub const ARTIFACT_ID_OVERRIDE: &str = "BRICKYARD_ARTIFACT_ID";

/// Expected owner of declared resource names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTarget {
    pub team: String,
    pub artifact_id: String,
}

impl ValidationTarget {
    /// Expect names owned by project of environment context.
    ///
    /// # Errors
    ///
    /// - Return [`ValidationError::Context`] if team cannot be derived.
    pub fn from_context(context: &EnvironmentContext) -> Result<Self> {
        Ok(Self {
            team: context.team()?,
            artifact_id: context.artifact_id.clone(),
        })
    }

    /// Expect names owned by externally supplied overrides.
    ///
    /// The group id override goes through the same prefix stripping as a
    /// project group id would.
    ///
    /// # Errors
    ///
    /// - Return [`ValidationError::MissingOverride`] if an override variable
    ///   is not set.
    /// - Return [`ValidationError::Context`] if team cannot be derived.
    pub fn from_overrides(prefix_to_strip: &str) -> Result<Self> {
        let group_id = read_override(GROUP_ID_OVERRIDE)?;
        let artifact_id = read_override(ARTIFACT_ID_OVERRIDE)?;

        Ok(Self {
            team: derive_team(&group_id, prefix_to_strip)?,
            artifact_id,
        })
    }
}

fn read_override(variable: &'static str) -> Result<String> {
    std::env::var(variable)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ValidationError::MissingOverride { variable })
}

/// Validate merged settings documents.
#[derive(Debug, Clone)]
pub struct Validator {
    target: ValidationTarget,
    skip: bool,
}

impl Validator {
    /// Construct new validator.
    pub fn new(target: ValidationTarget) -> Self {
        Self {
            target,
            skip: false,
        }
    }

    /// Toggle whether validation is skipped altogether.
    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Validate job settings.
    ///
    /// # Errors
    ///
    /// - Return [`ValidationError::MissingFailureNotification`] if nobody is
    ///   notified of failed runs.
    /// - Return any error of [`validate_path`] for the job name.
    pub fn validate_job(&self, job: &JobSettings) -> Result<()> {
        if self.skipped(job) {
            return Ok(());
        }

        if job.failure_targets().iter().all(|target| target.trim().is_empty()) {
            return Err(ValidationError::MissingFailureNotification {
                name: job.name.clone(),
            });
        }

        validate_path(&job.name, &self.target.team, &self.target.artifact_id)
    }

    /// Validate cluster settings.
    ///
    /// # Errors
    ///
    /// - Return any error of [`validate_path`] for the cluster name.
    pub fn validate_cluster(&self, cluster: &ClusterSettings) -> Result<()> {
        if self.skipped(cluster) {
            return Ok(());
        }

        validate_path(&cluster.cluster_name, &self.target.team, &self.target.artifact_id)
    }

    fn skipped(&self, document: &impl HasResourceName) -> bool {
        if self.skip {
            warn!("validation of {:?} skipped by configuration", document.resource_name());
        } else {
            debug!("validate {:?}", document.resource_name());
        }

        self.skip
    }
}

/// Validate resource name against expected owner.
///
/// Name must split on `/` into at least two segments, where the first equals
/// the team and the second equals the artifact id.
///
/// # Errors
///
/// - Return [`ValidationError::IllegalFormat`] if name has fewer than two
///   segments.
/// - Return [`ValidationError::IllegalValue`] if a segment does not match.
pub fn validate_path(name: &str, team: &str, artifact_id: &str) -> Result<()> {
    let segments = name.split('/').collect::<Vec<_>>();
    if segments.len() < 2 {
        return Err(ValidationError::IllegalFormat {
            name: name.to_string(),
        });
    }

    for (segment, expected, found) in [
        ("group", team, segments[0]),
        ("artifact", artifact_id, segments[1]),
    ] {
        if expected != found {
            return Err(ValidationError::IllegalValue {
                name: name.to_string(),
                segment,
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }

    Ok(())
}

/// Validation error types.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Job does not notify anyone of failed runs.
    #[error("job {name:?} must set at least one email_notifications.on_failure target")]
    MissingFailureNotification { name: String },

    /// Resource name does not have enough segments.
    #[error("illegal format of name {name:?}, expected \"<group>/<artifact>/...\"")]
    IllegalFormat { name: String },

    /// Resource name segment does not match expected owner.
    #[error("illegal value for {segment} of name {name:?}: expected {expected:?}, found {found:?}")]
    IllegalValue {
        name: String,
        segment: &'static str,
        expected: String,
        found: String,
    },

    /// Standalone override is not set.
    #[error("standalone validation requires environment variable {variable} to be set")]
    MissingOverride { variable: &'static str },

    /// Team identifier cannot be derived.
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Friendly result alias :3
pub type Result<T, E = ValidationError> = std::result::Result<T, E>;
