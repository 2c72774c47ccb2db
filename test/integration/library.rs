// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{FakeControlPlane, WorkspaceFixture};

use brickyard::{library::LibraryPlan, remote::model::ClusterState};

use anyhow::Result;
use pretty_assertions::assert_eq;

#[tokio::test(start_paused = true)]
async fn reconcile_terminated_cluster_by_set_difference() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_cluster("c-1", "team1/my-artifact/etl", ClusterState::Terminated);
    plane.add_installed("c-1", "dbfs:/libs/a.jar");
    plane.add_installed("c-1", "dbfs:/libs/b.jar");
    let reconciler = fixture
        .workspace
        .library_reconciler(plane.clone(), plane.clone());

    let desired = ["dbfs:/libs/b.jar", "dbfs:/libs/c.jar"];
    let plan = reconciler.reconcile("c-1", &desired).await?;

    assert_eq!(
        plan,
        LibraryPlan {
            to_install: vec!["dbfs:/libs/c.jar".into()],
            to_remove: vec!["dbfs:/libs/a.jar".into()],
            rejected: vec![],
        }
    );
    assert_eq!(
        plane.calls(),
        vec![
            "start c-1",
            "uninstall c-1 dbfs:/libs/a.jar",
            "install c-1 dbfs:/libs/c.jar",
            "delete c-1",
        ]
    );
    assert_eq!(plane.cluster_state("c-1"), Some(ClusterState::Terminated));
    assert_eq!(
        plane.installed_paths("c-1"),
        vec!["dbfs:/libs/b.jar", "dbfs:/libs/c.jar"]
    );

    let again = reconciler.reconcile("c-1", &desired).await?;
    assert!(again.is_empty());
    assert_eq!(plane.calls().len(), 4);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reconcile_active_cluster_restarts_it() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_cluster("c-2", "team1/my-artifact/etl", ClusterState::Running);
    plane.add_installed("c-2", "dbfs:/libs/a.jar");
    let reconciler = fixture
        .workspace
        .library_reconciler(plane.clone(), plane.clone());

    reconciler.reconcile("c-2", &["dbfs:/libs/b.jar"]).await?;

    assert_eq!(
        plane.calls(),
        vec![
            "uninstall c-2 dbfs:/libs/a.jar",
            "install c-2 dbfs:/libs/b.jar",
            "delete c-2",
            "start c-2",
        ]
    );
    assert_eq!(plane.cluster_state("c-2"), Some(ClusterState::Running));
    assert_eq!(plane.installed_paths("c-2"), vec!["dbfs:/libs/b.jar"]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reconcile_leaves_active_cluster_running_without_restart() -> Result<()> {
    let fixture = WorkspaceFixture::with_config(|config| {
        config.options.restart_after_library_change = false;
    })?;
    let plane = FakeControlPlane::new();
    plane.add_cluster("c-2", "team1/my-artifact/etl", ClusterState::Running);
    let reconciler = fixture
        .workspace
        .library_reconciler(plane.clone(), plane.clone());

    reconciler.reconcile("c-2", &["dbfs:/libs/b.jar"]).await?;

    assert_eq!(plane.calls(), vec!["install c-2 dbfs:/libs/b.jar"]);
    assert_eq!(plane.cluster_state("c-2"), Some(ClusterState::Running));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reconcile_rejects_non_archive_entries() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_cluster("c-3", "team1/my-artifact/etl", ClusterState::Running);
    plane.add_installed("c-3", "dbfs:/libs/b.jar");
    let reconciler = fixture
        .workspace
        .library_reconciler(plane.clone(), plane.clone());

    let plan = reconciler
        .reconcile("c-3", &["dbfs:/libs/b.jar", "requests==2.31"])
        .await?;

    assert_eq!(plan.rejected, vec!["requests==2.31"]);
    assert!(plan.is_empty());
    assert!(plane.calls().is_empty());

    Ok(())
}
