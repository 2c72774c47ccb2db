// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{FakeControlPlane, WorkspaceFixture};

use brickyard::{
    job::{control::JobCommand, JobError},
    remote::RemoteError,
    settings::job::{EmailNotifications, JobSettings},
};

use anyhow::Result;
use pretty_assertions::assert_eq;

fn declared(name: &str) -> JobSettings {
    JobSettings {
        name: name.into(),
        email_notifications: Some(EmailNotifications {
            on_failure: vec!["oncall@example.com".into()],
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn upsert_creates_then_resets_job() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    let orchestrator = fixture.workspace.job_orchestrator(plane.clone())?;

    let created = orchestrator
        .upsert(vec![declared("team1/my-artifact/nightly")])
        .await?;
    let reset = orchestrator
        .upsert(vec![declared("team1/my-artifact/nightly")])
        .await?;

    assert_eq!(created, reset);
    assert_eq!(plane.count("create-job"), 1);
    assert_eq!(plane.count("reset"), 1);

    let stored = orchestrator.find("team1/my-artifact/nightly").await?;
    let stored = stored.map(|job| job.settings).unwrap_or_default();
    assert_eq!(stored.timeout_seconds, 3600);
    assert_eq!(stored.max_concurrent_runs, 1);

    Ok(())
}

#[tokio::test]
async fn upsert_refuses_duplicate_remote_names() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_job(1, "team1/my-artifact/nightly");
    plane.add_job(2, "team1/my-artifact/nightly");
    let orchestrator = fixture.workspace.job_orchestrator(plane.clone())?;

    let result = orchestrator
        .upsert(vec![declared("team1/my-artifact/nightly")])
        .await;

    assert!(matches!(
        result,
        Err(JobError::Remote {
            source: RemoteError::DuplicateName { .. },
            ..
        })
    ));
    assert_eq!(plane.count("reset"), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restart_cancels_waits_for_drain_then_runs() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_job(7, "team1/my-artifact/streaming");
    plane.add_active_run(7, 101);
    plane.add_active_run(7, 102);
    plane.drain_after(2);
    let orchestrator = fixture.workspace.job_orchestrator(plane.clone())?;

    orchestrator
        .control(vec![declared("team1/my-artifact/streaming")], JobCommand::Restart)
        .await?;

    let calls = plane.calls();
    assert_eq!(plane.count("cancel"), 2);
    assert_eq!(plane.count("run-now"), 1);
    assert!(plane.count("list-runs") >= 4);
    assert_eq!(calls.last().map(String::as_str), Some("run-now 7"));

    let last_cancel = calls.iter().rposition(|call| call.starts_with("cancel"));
    let polls_after_cancel = calls
        .iter()
        .skip(last_cancel.map_or(0, |index| index + 1))
        .filter(|call| call.starts_with("list-runs"))
        .count();
    assert!(polls_after_cancel >= 3);

    Ok(())
}

#[tokio::test]
async fn start_refuses_job_with_active_runs() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.add_job(7, "team1/my-artifact/streaming");
    plane.add_active_run(7, 101);
    let orchestrator = fixture.workspace.job_orchestrator(plane.clone())?;

    let result = orchestrator
        .control(vec![declared("team1/my-artifact/streaming")], JobCommand::Start)
        .await;

    assert!(matches!(result, Err(JobError::AlreadyRunning { active: 1, .. })));
    assert_eq!(plane.count("run-now"), 0);

    Ok(())
}

#[tokio::test]
async fn stop_cancels_active_runs_across_pages() -> Result<()> {
    let fixture = WorkspaceFixture::with_config(|config| {
        config.options.run_page_size = 2;
    })?;
    let plane = FakeControlPlane::new();
    plane.add_job(7, "team1/my-artifact/streaming");
    for run_id in 101..106 {
        plane.add_active_run(7, run_id);
    }
    let orchestrator = fixture.workspace.job_orchestrator(plane.clone())?;

    orchestrator
        .control(vec![declared("team1/my-artifact/streaming")], JobCommand::Stop)
        .await?;

    assert_eq!(plane.count("cancel"), 5);
    assert_eq!(plane.count("list-runs"), 3);

    Ok(())
}

#[tokio::test]
async fn name_filter_skips_non_matching_jobs() -> Result<()> {
    let fixture = WorkspaceFixture::with_config(|config| {
        config.options.job_name_filter = Some("/streaming-".into());
    })?;
    let plane = FakeControlPlane::new();
    plane.add_job(7, "team1/my-artifact/nightly");
    plane.add_job(8, "team1/my-artifact/streaming-events");
    let orchestrator = fixture.workspace.job_orchestrator(plane.clone())?;

    orchestrator
        .control(
            vec![
                declared("team1/my-artifact/nightly"),
                declared("team1/my-artifact/streaming-events"),
            ],
            JobCommand::Start,
        )
        .await?;

    assert_eq!(plane.calls().iter().filter(|call| *call == "run-now 8").count(), 1);
    assert_eq!(plane.count("run-now"), 1);

    Ok(())
}

#[tokio::test]
async fn control_of_unknown_job_fails() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    let orchestrator = fixture.workspace.job_orchestrator(plane.clone())?;

    let result = orchestrator
        .control(vec![declared("team1/my-artifact/ghost")], JobCommand::Stop)
        .await;

    assert!(matches!(result, Err(JobError::NotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn upsert_stops_when_job_is_missing_after_upsert() -> Result<()> {
    let fixture = WorkspaceFixture::new()?;
    let plane = FakeControlPlane::new();
    plane.forget_upserts();
    let orchestrator = fixture.workspace.job_orchestrator(plane.clone())?;

    let result = orchestrator
        .upsert(vec![
            declared("team1/my-artifact/nightly"),
            declared("team1/my-artifact/hourly"),
        ])
        .await;

    assert!(matches!(
        result,
        Err(JobError::Inconsistent {
            job_id: 1,
            found: None,
            ..
        })
    ));
    assert_eq!(plane.count("create-job"), 1);
    assert_eq!(plane.count("reset"), 0);

    Ok(())
}
