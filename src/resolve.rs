// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Name resolution.
//!
//! Declared resources are addressed by human readable names, but the control
//! plane only knows them by the ids it assigned. Names are not unique on the
//! remote side, so resolution reports every id sharing a requested name, and
//! warns about it. Resolution is best effort: names without any match are
//! warned about and left out, so callers must not expect one id per name.
//!
//! Remote state can change between two operations, so nothing gets cached.
//! Every call lists the remote side anew.

use crate::remote::{model::ClusterInfo, ClusterService, RemoteError};

use std::collections::BTreeMap;
use tracing::{instrument, warn};

/// Outcome of resolving names against a listing.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Matching ids, grouped by requested name in request order, then in
    /// listing order.
    pub ids: Vec<String>,

    /// Requested names shared by several remote resources.
    pub duplicates: Vec<String>,

    /// Requested names without any remote resource.
    pub missing: Vec<String>,
}

impl Resolution {
    /// Check whether every requested name matched exactly one resource.
    pub fn is_exact(&self) -> bool {
        self.duplicates.is_empty() && self.missing.is_empty()
    }
}

/// Resolve names against a listing of `(name, id)` pairs.
///
/// Emits one warning per duplicated name, and one per missing name. A name
/// requested twice is resolved once.
pub fn resolve_names<'a, N, L>(names: N, listing: L) -> Resolution
where
    N: IntoIterator<Item = &'a str>,
    L: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, id) in listing {
        by_name.entry(name).or_default().push(id);
    }

    let mut resolution = Resolution::default();
    let mut seen = Vec::new();
    for name in names {
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);

        match by_name.get(name) {
            Some(ids) => {
                if ids.len() > 1 {
                    warn!("found {} remote resources named {name:?}: {ids:?}", ids.len());
                    resolution.duplicates.push(name.to_string());
                }
                resolution.ids.extend(ids.iter().map(ToString::to_string));
            }
            None => {
                warn!("no remote resource named {name:?}");
                resolution.missing.push(name.to_string());
            }
        }
    }

    resolution
}

/// Resolve cluster names against a fresh cluster listing.
///
/// # Errors
///
/// - Return [`RemoteError`] if clusters cannot be listed.
#[instrument(skip(clusters), level = "debug")]
pub async fn resolve_clusters(
    clusters: &dyn ClusterService,
    names: &[&str],
) -> Result<Resolution, RemoteError> {
    let listing = clusters.list().await?;
    Ok(resolve_names(names.iter().copied(), pairs(&listing)))
}

/// Resolve a single cluster name to its first listed id.
///
/// # Errors
///
/// - Return [`RemoteError`] if clusters cannot be listed.
pub async fn resolve_cluster(
    clusters: &dyn ClusterService,
    name: &str,
) -> Result<Option<String>, RemoteError> {
    let resolution = resolve_clusters(clusters, &[name]).await?;
    Ok(resolution.ids.into_iter().next())
}

fn pairs(listing: &[ClusterInfo]) -> impl Iterator<Item = (&str, &str)> {
    listing
        .iter()
        .map(|info| (info.cluster_name.as_str(), info.cluster_id.as_str()))
}
