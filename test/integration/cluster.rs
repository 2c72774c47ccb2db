// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{FakeControlPlane, WorkspaceFixture};

use brickyard::{
    cluster::{control::ClusterCommand, upsert::UpsertOutcome, ClusterError},
    remote::model::ClusterState,
    settings::cluster::ClusterSettings,
};

use anyhow::Result;
use pretty_assertions::assert_eq;

const ARTIFACT: &str = "dbfs:/libs/my-artifact-1.0.0.jar";

fn declared(name: &str) -> ClusterSettings {
    ClusterSettings {
        cluster_name: name.into(),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn create_missing_cluster_with_project_archive() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    let orchestrator = fixture
        .workspace
        .cluster_orchestrator(plane.clone(), plane.clone());

    let reports = orchestrator
        .upsert_all(vec![declared("team1/my-artifact/etl")])
        .await?;

    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0].outcome, UpsertOutcome::Created { .. }));
    assert_eq!(plane.count("create"), 1);
    assert_eq!(plane.count("install"), 1);
    assert_eq!(plane.count("edit"), 0);
    assert_eq!(plane.count("start"), 0);
    assert_eq!(plane.count("delete"), 0);

    let cluster_id = reports[0].outcome.cluster_id().unwrap_or_default();
    assert_eq!(plane.installed_paths(cluster_id), vec![ARTIFACT]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn update_existing_cluster_in_place() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_cluster("c-9", "team1/my-artifact/etl", ClusterState::Running);
    plane.add_installed("c-9", "dbfs:/libs/my-artifact-0.9.0.jar");
    let orchestrator = fixture
        .workspace
        .cluster_orchestrator(plane.clone(), plane.clone());

    let reports = orchestrator
        .upsert_all(vec![declared("team1/my-artifact/etl")])
        .await?;

    assert_eq!(reports[0].outcome.cluster_id(), Some("c-9"));
    assert!(matches!(reports[0].outcome, UpsertOutcome::Updated { .. }));
    let mutations = plane
        .calls()
        .into_iter()
        .filter(|call| call != "list")
        .collect::<Vec<_>>();
    assert_eq!(
        mutations,
        vec![
            "uninstall c-9 dbfs:/libs/my-artifact-0.9.0.jar".to_string(),
            format!("install c-9 {ARTIFACT}"),
            "edit c-9".to_string(),
        ]
    );
    assert_eq!(plane.installed_paths("c-9"), vec![ARTIFACT]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn update_starts_terminated_cluster_before_attaching() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_cluster("c-3", "team1/my-artifact/etl", ClusterState::Terminated);
    let orchestrator = fixture
        .workspace
        .cluster_orchestrator(plane.clone(), plane.clone());

    orchestrator
        .upsert_all(vec![declared("team1/my-artifact/etl")])
        .await?;

    let calls = plane.calls();
    let start = calls.iter().position(|call| call == "start c-3");
    let install = calls.iter().position(|call| call.starts_with("install c-3"));
    assert!(start.is_some());
    assert!(start < install);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn first_listed_cluster_wins_on_duplicate_names() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_cluster("c-1", "team1/my-artifact/etl", ClusterState::Running);
    plane.add_cluster("c-2", "team1/my-artifact/etl", ClusterState::Running);
    let orchestrator = fixture
        .workspace
        .cluster_orchestrator(plane.clone(), plane.clone());

    let reports = orchestrator
        .upsert_all(vec![declared("team1/my-artifact/etl")])
        .await?;

    assert_eq!(reports[0].outcome.cluster_id(), Some("c-1"));
    assert_eq!(plane.count("edit"), 1);
    assert!(plane.calls().contains(&"edit c-1".to_string()));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn declared_duplicates_fail_without_remote_mutation() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    let orchestrator = fixture
        .workspace
        .cluster_orchestrator(plane.clone(), plane.clone());

    let reports = orchestrator
        .upsert_all(vec![
            declared("team1/my-artifact/etl"),
            declared("team1/my-artifact/etl"),
            declared("team1/my-artifact/adhoc"),
        ])
        .await?;

    let failed = reports
        .iter()
        .filter(|report| {
            matches!(
                report.outcome,
                UpsertOutcome::Failed(ClusterError::DuplicateDeclaration { .. })
            )
        })
        .count();
    assert_eq!(failed, 2);
    assert!(reports[2].outcome.is_success());
    assert_eq!(plane.calls().iter().filter(|call| call.starts_with("create")).count(), 1);
    assert!(plane
        .calls()
        .contains(&"create team1/my-artifact/adhoc".to_string()));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn invalid_declaration_fails_whole_batch_before_remote_calls() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    let orchestrator = fixture
        .workspace
        .cluster_orchestrator(plane.clone(), plane.clone());

    let result = orchestrator
        .upsert_all(vec![
            declared("team1/my-artifact/etl"),
            declared("team2/other-artifact/etl"),
        ])
        .await;

    assert!(matches!(result, Err(ClusterError::Validation(_))));
    assert!(plane.calls().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stuck_cluster_is_abandoned_at_batch_deadline() -> Result<()> {
    let fixture = WorkspaceFixture::with_config(|config| {
        config.options.batch_timeout_secs = 60;
    })?;
    let plane = FakeControlPlane::new();
    plane.add_cluster("c-5", "team1/my-artifact/stuck", ClusterState::Error);
    let orchestrator = fixture
        .workspace
        .cluster_orchestrator(plane.clone(), plane.clone());

    let reports = orchestrator
        .upsert_all(vec![
            declared("team1/my-artifact/stuck"),
            declared("team1/my-artifact/fresh"),
        ])
        .await?;

    assert!(matches!(reports[0].outcome, UpsertOutcome::Abandoned));
    assert!(matches!(reports[1].outcome, UpsertOutcome::Created { .. }));
    assert_eq!(plane.count("edit"), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_then_start_declared_cluster() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_cluster("c-4", "team1/my-artifact/etl", ClusterState::Running);
    let orchestrator = fixture
        .workspace
        .cluster_orchestrator(plane.clone(), plane.clone());

    orchestrator
        .control(&["team1/my-artifact/etl"], ClusterCommand::Stop)
        .await?;
    assert_eq!(plane.cluster_state("c-4"), Some(ClusterState::Terminated));

    orchestrator
        .control(&["team1/my-artifact/etl"], ClusterCommand::Start)
        .await?;
    assert_eq!(plane.cluster_state("c-4"), Some(ClusterState::Running));
    assert_eq!(plane.count("delete"), 1);
    assert_eq!(plane.count("start"), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn control_of_unknown_cluster_fails() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    let orchestrator = fixture
        .workspace
        .cluster_orchestrator(plane.clone(), plane.clone());

    let result = orchestrator
        .control(&["team1/my-artifact/ghost"], ClusterCommand::Restart)
        .await;

    assert!(matches!(result, Err(ClusterError::NotFound { .. })));
    assert_eq!(plane.count("delete"), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_entries_leave_siblings_converged() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_cluster("c-7", "team1/my-artifact/broken-libs", ClusterState::Running);
    plane.add_cluster("c-8", "team1/my-artifact/broken-edit", ClusterState::Running);
    plane.fail_create("team1/my-artifact/broken-create");
    plane.fail_install("c-7");
    plane.fail_edit("c-8");
    let orchestrator = fixture
        .workspace
        .cluster_orchestrator(plane.clone(), plane.clone());

    let reports = orchestrator
        .upsert_all(vec![
            declared("team1/my-artifact/broken-create"),
            declared("team1/my-artifact/broken-libs"),
            declared("team1/my-artifact/broken-edit"),
            declared("team1/my-artifact/fresh"),
        ])
        .await?;

    assert_eq!(reports.len(), 4);
    assert!(matches!(
        reports[0].outcome,
        UpsertOutcome::Failed(ClusterError::Remote { command: "create", .. })
    ));
    assert!(matches!(
        reports[1].outcome,
        UpsertOutcome::Failed(ClusterError::Library { .. })
    ));
    assert!(matches!(
        reports[2].outcome,
        UpsertOutcome::Failed(ClusterError::Remote { command: "edit", .. })
    ));
    assert!(matches!(reports[3].outcome, UpsertOutcome::Created { .. }));

    let fresh = reports[3].outcome.cluster_id().unwrap_or_default();
    assert_eq!(plane.installed_paths(fresh), vec![ARTIFACT]);
    assert!(plane.installed_paths("c-7").is_empty());
    assert!(!plane.calls().contains(&"edit c-7".to_string()));

    Ok(())
}
