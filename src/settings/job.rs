// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Job settings layout.

use crate::settings::{
    cluster::ClusterSpec, is_zero, library::Library, HasArtifactPaths, HasResourceName,
};

use serde::{Deserialize, Serialize};

/// Scheduled job settings document.
///
/// A job either runs on a cluster of its own described by `new_cluster`, or
/// on an already existing cluster referenced by `existing_cluster_id`, never
/// both. Numeric fields treat zero as "unset".
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct JobSettings {
    /// Human readable name, also the lookup key on the remote side.
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_cluster: Option<ClusterSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_cluster_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<Library>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_notifications: Option<EmailNotifications>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout_seconds: u32,

    /// Retries after a failed run, negative means retry forever.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_retries: i32,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub min_retry_interval_millis: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_on_timeout: Option<bool>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_concurrent_runs: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<CronSchedule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_task: Option<NotebookTask>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spark_jar_task: Option<SparkJarTask>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spark_python_task: Option<SparkPythonTask>,

    /// Spark submit tasks ship their own classpath, so they exclude
    /// `libraries`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spark_submit_task: Option<SparkSubmitTask>,
}

impl JobSettings {
    /// Check whether job references an existing cluster instead of its own.
    pub fn uses_existing_cluster(&self) -> bool {
        self.existing_cluster_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }

    /// Targets notified when a run fails.
    pub fn failure_targets(&self) -> &[String] {
        self.email_notifications
            .as_ref()
            .map(|notifications| notifications.on_failure.as_slice())
            .unwrap_or_default()
    }
}

impl HasResourceName for JobSettings {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn set_resource_name(&mut self, name: String) {
        self.name = name;
    }
}

impl HasArtifactPaths for JobSettings {
    fn artifact_paths(&self) -> Vec<&str> {
        self.libraries
            .iter()
            .filter_map(Library::archive_path)
            .collect()
    }
}

/// Email targets notified on run lifecycle events.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct EmailNotifications {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_start: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_success: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_failure: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_alert_for_skipped_runs: Option<bool>,
}

/// Cron schedule of a job.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct CronSchedule {
    /// Quartz cron expression.
    pub quartz_cron_expression: String,

    pub timezone_id: String,
}

#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct NotebookTask {
    pub notebook_path: String,

    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub base_parameters: std::collections::BTreeMap<String, String>,
}

#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SparkJarTask {
    pub main_class_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SparkPythonTask {
    pub python_file: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SparkSubmitTask {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserialize_job_settings() -> anyhow::Result<()> {
        let result: JobSettings = serde_json::from_str(indoc! {r#"
            {
              "name": "team1/my-artifact/nightly",
              "existing_cluster_id": "0923-164208-meows279",
              "libraries": [{ "jar": "dbfs:/libs/app.jar" }, { "egg": "dbfs:/libs/app.egg" }],
              "email_notifications": { "on_failure": ["oncall@example.com"] },
              "max_retries": 3,
              "spark_jar_task": { "main_class_name": "com.example.Main" }
            }
        "#})?;

        assert_eq!(result.name, "team1/my-artifact/nightly");
        assert!(result.uses_existing_cluster());
        assert_eq!(result.failure_targets(), ["oncall@example.com".to_string()]);
        assert_eq!(result.artifact_paths(), vec!["dbfs:/libs/app.jar"]);
        assert_eq!(result.max_retries, 3);

        Ok(())
    }

    #[test]
    fn blank_existing_cluster_is_not_a_reference() {
        let settings = JobSettings {
            existing_cluster_id: Some(String::new()),
            ..Default::default()
        };
        assert!(!settings.uses_existing_cluster());
        assert!(settings.failure_targets().is_empty());
    }
}
