// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Default merge engine.
//!
//! Fills a partially declared settings document with values from a default
//! document of the same kind, and synthesizes the fields that can only be
//! derived from the invoking project.
//!
//! # Fill Rules
//!
//! Rules apply field by field, independently of each other:
//!
//! - Empty names become `{team}/{artifact_id}`.
//! - Absent nested objects are cloned wholesale from the defaults. Present
//!   nested objects are filled sub-field by sub-field with these same rules.
//! - Numbers that hold zero are "unset" and get the default value. Yes, this
//!   means a declared zero cannot be told apart from a missing value.
//! - Empty strings, lists, and maps are "unset" as well.
//! - Autoscaling clusters never get a default worker count.
//! - Jobs on an existing cluster never get a default new cluster.
//! - Jobs with a spark submit task never get default libraries.
//! - Retry intervals are only defaulted for jobs that retry at all.
//! - Cluster tags always carry a `team` tag, plus `delta = "true"` when the
//!   spark configuration enables delta features.
//!
//! Every fill is logged with its before and after value, and recorded in the
//! returned [`Merged`] document. Merging an already merged document against
//! the same defaults changes nothing.

pub mod defaults;

use crate::{
    context::{ContextError, EnvironmentContext},
    merge::defaults::DefaultsProvider,
    settings::{
        cluster::{AwsAttributes, ClusterSettings, ClusterSpec},
        job::{EmailNotifications, JobSettings},
        HasResourceName,
    },
};

use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{info, instrument};

/// Tag holding the team identifier of a cluster.
pub const TEAM_TAG: &str = "team";

/// Tag marking clusters that use delta format features.
pub const DELTA_TAG: &str = "delta";

/// Merge defaults into settings documents.
#[derive(Debug, Clone)]
pub struct DefaultMerger {
    defaults: Arc<DefaultsProvider>,
    context: Arc<EnvironmentContext>,
}

impl DefaultMerger {
    /// Construct new merger.
    pub fn new(defaults: Arc<DefaultsProvider>, context: Arc<EnvironmentContext>) -> Self {
        Self { defaults, context }
    }

    /// Environment context used for synthesized fields.
    pub fn context(&self) -> &EnvironmentContext {
        &self.context
    }

    /// Fill job settings document with defaults.
    ///
    /// # Errors
    ///
    /// - Return [`MergeError::Context`] if team identifier cannot be derived.
    /// - Return [`MergeError::Serialize`] if a filled value cannot be logged.
    #[instrument(skip(self, document), fields(job = %document.name), level = "debug")]
    pub fn merge_job(&self, mut document: JobSettings) -> Result<Merged<JobSettings>> {
        let mut scope = MergeScope::new(&self.context)?;
        scope.fill_name(&mut document)?;
        document.merge_defaults(&self.defaults.job, "", &mut scope)?;
        Ok(scope.finish(document))
    }

    /// Fill cluster settings document with defaults.
    ///
    /// # Errors
    ///
    /// - Return [`MergeError::Context`] if team identifier cannot be derived.
    /// - Return [`MergeError::Serialize`] if a filled value cannot be logged.
    #[instrument(skip(self, document), fields(cluster = %document.cluster_name), level = "debug")]
    pub fn merge_cluster(&self, mut document: ClusterSettings) -> Result<Merged<ClusterSettings>> {
        let mut scope = MergeScope::new(&self.context)?;
        scope.fill_name(&mut document)?;
        document.merge_defaults(&self.defaults.cluster, "", &mut scope)?;
        Ok(scope.finish(document))
    }
}

/// Merged document together with the fills applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged<T> {
    pub document: T,
    pub fills: Vec<FillRecord>,
}

/// One default fill decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillRecord {
    /// Dotted path of the filled field.
    pub field: String,

    /// JSON text of value before the fill.
    pub before: String,

    /// JSON text of value after the fill.
    pub after: String,
}

/// Fill a document from a default document of the same kind.
pub(crate) trait MergeDefaults {
    fn merge_defaults(
        &mut self,
        defaults: &Self,
        prefix: &str,
        scope: &mut MergeScope<'_>,
    ) -> Result<()>;
}

/// Shared state of a single merge.
pub(crate) struct MergeScope<'a> {
    context: &'a EnvironmentContext,
    team: String,
    fills: Vec<FillRecord>,
}

impl<'a> MergeScope<'a> {
    fn new(context: &'a EnvironmentContext) -> Result<Self> {
        Ok(Self {
            context,
            team: context.team()?,
            fills: Vec::new(),
        })
    }

    fn finish<T>(self, document: T) -> Merged<T> {
        Merged {
            document,
            fills: self.fills,
        }
    }

    fn record<T: Serialize + ?Sized>(
        &mut self,
        field: String,
        before: &T,
        after: &T,
    ) -> Result<()> {
        let before = serde_json::to_string(before).map_err(|err| MergeError::Serialize {
            source: err,
            field: field.clone(),
        })?;
        let after = serde_json::to_string(after).map_err(|err| MergeError::Serialize {
            source: err,
            field: field.clone(),
        })?;
        info!("default {field}: {before} -> {after}");
        self.fills.push(FillRecord {
            field,
            before,
            after,
        });

        Ok(())
    }

    fn fill_name(&mut self, document: &mut impl HasResourceName) -> Result<()> {
        if !document.resource_name().trim().is_empty() {
            return Ok(());
        }

        let name = self.context.default_resource_name()?;
        self.record("name".into(), document.resource_name(), name.as_str())?;
        document.set_resource_name(name);

        Ok(())
    }

    fn fill_text(
        &mut self,
        field: String,
        value: &mut Option<String>,
        default: &Option<String>,
    ) -> Result<()> {
        let unset = value.as_deref().is_none_or(str::is_empty);
        let fallback = default.as_deref().filter(|fallback| !fallback.is_empty());
        if let (true, Some(fallback)) = (unset, fallback) {
            self.record(field, &*value, &Some(fallback.to_string()))?;
            *value = Some(fallback.to_string());
        }

        Ok(())
    }

    fn fill_number<T>(&mut self, field: String, value: &mut T, default: T) -> Result<()>
    where
        T: Copy + Default + PartialEq + Serialize,
    {
        // TODO: Tell a declared zero apart from an unset one once settings
        // documents carry explicit absence for numbers.
        if *value == T::default() && default != T::default() {
            self.record(field, &*value, &default)?;
            *value = default;
        }

        Ok(())
    }

    fn fill_flag(
        &mut self,
        field: String,
        value: &mut Option<bool>,
        default: Option<bool>,
    ) -> Result<()> {
        if value.is_none() && default.is_some() {
            self.record(field, &*value, &default)?;
            *value = default;
        }

        Ok(())
    }

    fn fill_list<T>(&mut self, field: String, value: &mut Vec<T>, default: &[T]) -> Result<()>
    where
        T: Clone + Serialize,
    {
        if value.is_empty() && !default.is_empty() {
            self.record(field, value.as_slice(), default)?;
            *value = default.to_vec();
        }

        Ok(())
    }

    fn fill_map(
        &mut self,
        field: String,
        value: &mut BTreeMap<String, String>,
        default: &BTreeMap<String, String>,
    ) -> Result<()> {
        if value.is_empty() && !default.is_empty() {
            self.record(field, &*value, default)?;
            *value = default.clone();
        }

        Ok(())
    }

    fn fill_nested<T>(
        &mut self,
        field: String,
        value: &mut Option<T>,
        default: &Option<T>,
    ) -> Result<()>
    where
        T: MergeDefaults + Clone + Default + Serialize,
    {
        if value.is_none() {
            if let Some(fallback) = default {
                self.record(field.clone(), &*value, default)?;
                *value = Some(fallback.clone());
            }
        }

        if let Some(nested) = value.as_mut() {
            let fallback = default.clone().unwrap_or_default();
            nested.merge_defaults(&fallback, &field, self)?;
        }

        Ok(())
    }

    fn fill_tags(
        &mut self,
        field: String,
        tags: &mut BTreeMap<String, String>,
        uses_delta: bool,
    ) -> Result<()> {
        let team_unset = tags.get(TEAM_TAG).is_none_or(|team| team.trim().is_empty());
        if team_unset {
            let before = tags.clone();
            tags.insert(TEAM_TAG.into(), self.team.clone());
            self.record(field.clone(), &before, &*tags)?;
        }

        let delta_set = tags
            .get(DELTA_TAG)
            .is_some_and(|delta| delta.trim().eq_ignore_ascii_case("true"));
        if uses_delta && !delta_set {
            let before = tags.clone();
            tags.insert(DELTA_TAG.into(), "true".into());
            self.record(field, &before, &*tags)?;
        }

        Ok(())
    }
}

fn join(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

impl MergeDefaults for JobSettings {
    fn merge_defaults(
        &mut self,
        defaults: &Self,
        prefix: &str,
        scope: &mut MergeScope<'_>,
    ) -> Result<()> {
        // INVARIANT: New cluster and existing cluster are mutually exclusive.
        if !self.uses_existing_cluster() {
            scope.fill_nested(
                join(prefix, "new_cluster"),
                &mut self.new_cluster,
                &defaults.new_cluster,
            )?;
        }

        // INVARIANT: Spark submit tasks cannot take libraries.
        if self.spark_submit_task.is_none() {
            scope.fill_list(join(prefix, "libraries"), &mut self.libraries, &defaults.libraries)?;
        }

        scope.fill_nested(
            join(prefix, "email_notifications"),
            &mut self.email_notifications,
            &defaults.email_notifications,
        )?;
        scope.fill_number(
            join(prefix, "timeout_seconds"),
            &mut self.timeout_seconds,
            defaults.timeout_seconds,
        )?;
        scope.fill_number(
            join(prefix, "max_retries"),
            &mut self.max_retries,
            defaults.max_retries,
        )?;

        // INVARIANT: Retry interval only matters for jobs that retry.
        if self.max_retries != 0 {
            scope.fill_number(
                join(prefix, "min_retry_interval_millis"),
                &mut self.min_retry_interval_millis,
                defaults.min_retry_interval_millis,
            )?;
        }

        scope.fill_flag(
            join(prefix, "retry_on_timeout"),
            &mut self.retry_on_timeout,
            defaults.retry_on_timeout,
        )?;
        scope.fill_number(
            join(prefix, "max_concurrent_runs"),
            &mut self.max_concurrent_runs,
            defaults.max_concurrent_runs,
        )?;
        if self.schedule.is_none() && defaults.schedule.is_some() {
            scope.record(join(prefix, "schedule"), &self.schedule, &defaults.schedule)?;
            self.schedule = defaults.schedule.clone();
        }

        Ok(())
    }
}

impl MergeDefaults for ClusterSpec {
    fn merge_defaults(
        &mut self,
        defaults: &Self,
        prefix: &str,
        scope: &mut MergeScope<'_>,
    ) -> Result<()> {
        scope.fill_text(
            join(prefix, "spark_version"),
            &mut self.spark_version,
            &defaults.spark_version,
        )?;
        scope.fill_text(
            join(prefix, "node_type_id"),
            &mut self.node_type_id,
            &defaults.node_type_id,
        )?;
        scope.fill_text(
            join(prefix, "driver_node_type_id"),
            &mut self.driver_node_type_id,
            &defaults.driver_node_type_id,
        )?;

        // INVARIANT: Autoscale range and fixed worker count are mutually exclusive.
        if self.autoscale.is_none() {
            scope.fill_number(
                join(prefix, "num_workers"),
                &mut self.num_workers,
                defaults.num_workers,
            )?;
        }

        scope.fill_number(
            join(prefix, "autotermination_minutes"),
            &mut self.autotermination_minutes,
            defaults.autotermination_minutes,
        )?;
        scope.fill_map(join(prefix, "spark_conf"), &mut self.spark_conf, &defaults.spark_conf)?;
        scope.fill_map(
            join(prefix, "spark_env_vars"),
            &mut self.spark_env_vars,
            &defaults.spark_env_vars,
        )?;
        scope.fill_nested(
            join(prefix, "aws_attributes"),
            &mut self.aws_attributes,
            &defaults.aws_attributes,
        )?;
        scope.fill_map(join(prefix, "custom_tags"), &mut self.custom_tags, &defaults.custom_tags)?;
        let uses_delta = self.uses_delta();
        scope.fill_tags(join(prefix, "custom_tags"), &mut self.custom_tags, uses_delta)?;
        scope.fill_list(
            join(prefix, "ssh_public_keys"),
            &mut self.ssh_public_keys,
            &defaults.ssh_public_keys,
        )?;
        scope.fill_flag(
            join(prefix, "enable_elastic_disk"),
            &mut self.enable_elastic_disk,
            defaults.enable_elastic_disk,
        )?;

        Ok(())
    }
}

impl MergeDefaults for ClusterSettings {
    fn merge_defaults(
        &mut self,
        defaults: &Self,
        prefix: &str,
        scope: &mut MergeScope<'_>,
    ) -> Result<()> {
        self.spec.merge_defaults(&defaults.spec, prefix, scope)?;
        scope.fill_list(
            join(prefix, "artifact_paths"),
            &mut self.artifact_paths,
            &defaults.artifact_paths,
        )?;

        Ok(())
    }
}

impl MergeDefaults for AwsAttributes {
    fn merge_defaults(
        &mut self,
        defaults: &Self,
        prefix: &str,
        scope: &mut MergeScope<'_>,
    ) -> Result<()> {
        scope.fill_text(
            join(prefix, "availability"),
            &mut self.availability,
            &defaults.availability,
        )?;
        scope.fill_text(join(prefix, "zone_id"), &mut self.zone_id, &defaults.zone_id)?;
        scope.fill_number(
            join(prefix, "first_on_demand"),
            &mut self.first_on_demand,
            defaults.first_on_demand,
        )?;
        scope.fill_number(
            join(prefix, "spot_bid_price_percent"),
            &mut self.spot_bid_price_percent,
            defaults.spot_bid_price_percent,
        )?;
        scope.fill_text(
            join(prefix, "ebs_volume_type"),
            &mut self.ebs_volume_type,
            &defaults.ebs_volume_type,
        )?;
        scope.fill_number(
            join(prefix, "ebs_volume_count"),
            &mut self.ebs_volume_count,
            defaults.ebs_volume_count,
        )?;
        scope.fill_number(
            join(prefix, "ebs_volume_size"),
            &mut self.ebs_volume_size,
            defaults.ebs_volume_size,
        )?;
        scope.fill_text(
            join(prefix, "instance_profile_arn"),
            &mut self.instance_profile_arn,
            &defaults.instance_profile_arn,
        )?;

        Ok(())
    }
}

impl MergeDefaults for EmailNotifications {
    fn merge_defaults(
        &mut self,
        defaults: &Self,
        prefix: &str,
        scope: &mut MergeScope<'_>,
    ) -> Result<()> {
        scope.fill_list(join(prefix, "on_start"), &mut self.on_start, &defaults.on_start)?;
        scope.fill_list(join(prefix, "on_success"), &mut self.on_success, &defaults.on_success)?;
        scope.fill_list(join(prefix, "on_failure"), &mut self.on_failure, &defaults.on_failure)?;
        scope.fill_flag(
            join(prefix, "no_alert_for_skipped_runs"),
            &mut self.no_alert_for_skipped_runs,
            defaults.no_alert_for_skipped_runs,
        )?;

        Ok(())
    }
}

/// Default merge error types.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Filled value cannot be serialized for the audit log.
    #[error("failed to serialize default value of {field}")]
    Serialize {
        #[source]
        source: serde_json::Error,
        field: String,
    },

    /// Team identifier cannot be derived.
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Friendly result alias :3
pub type Result<T, E = MergeError> = std::result::Result<T, E>;
