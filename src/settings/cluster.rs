// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Cluster settings layout.
//!
//! A [`ClusterSpec`] describes the compute of a cluster, and is shared by
//! declared clusters and by the ephemeral clusters that jobs spin up for
//! themselves. A [`ClusterSettings`] document is a named, standalone cluster
//! with the archive libraries it should have attached.

use crate::settings::{is_zero, HasArtifactPaths, HasClusterName, HasResourceName};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Spark configuration key prefix that marks delta format usage.
pub const DELTA_CONF_PREFIX: &str = "spark.databricks.delta.";

/// Compute description of a cluster.
///
/// Numeric fields treat zero as "unset".
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ClusterSpec {
    /// Runtime version of the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spark_version: Option<String>,

    /// Instance type of worker nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type_id: Option<String>,

    /// Instance type of driver node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_node_type_id: Option<String>,

    /// Fixed number of workers.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub num_workers: u32,

    /// Worker range for autoscaling clusters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscale: Option<AutoScale>,

    /// Minutes of inactivity before the cluster terminates itself.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub autotermination_minutes: u32,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spark_conf: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spark_env_vars: BTreeMap<String, String>,

    /// Cloud provider attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_attributes: Option<AwsAttributes>,

    /// Tags applied to every resource of the cluster.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_tags: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_public_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_elastic_disk: Option<bool>,
}

impl ClusterSpec {
    /// Check whether spark configuration enables delta format features.
    pub fn uses_delta(&self) -> bool {
        self.spark_conf
            .keys()
            .any(|key| key.starts_with(DELTA_CONF_PREFIX))
    }
}

/// Autoscaling worker range.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct AutoScale {
    pub min_workers: u32,
    pub max_workers: u32,
}

/// Cloud provider attributes of a cluster.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct AwsAttributes {
    /// Spot or on-demand availability policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,

    /// Number of nodes placed on on-demand instances.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub first_on_demand: u32,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub spot_bid_price_percent: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebs_volume_type: Option<String>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub ebs_volume_count: u32,

    /// Size of each EBS volume in GiB.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ebs_volume_size: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_profile_arn: Option<String>,
}

/// Standalone cluster settings document.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ClusterSettings {
    /// Human readable name, also the lookup key on the remote side.
    #[serde(default)]
    pub cluster_name: String,

    #[serde(flatten)]
    pub spec: ClusterSpec,

    /// Archive libraries to keep attached to the cluster.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifact_paths: Vec<String>,
}

impl HasResourceName for ClusterSettings {
    fn resource_name(&self) -> &str {
        &self.cluster_name
    }

    fn set_resource_name(&mut self, name: String) {
        self.cluster_name = name;
    }
}

impl HasClusterName for ClusterSettings {
    fn cluster_name(&self) -> &str {
        &self.cluster_name
    }
}

impl HasArtifactPaths for ClusterSettings {
    fn artifact_paths(&self) -> Vec<&str> {
        self.artifact_paths.iter().map(String::as_str).collect()
    }
}
