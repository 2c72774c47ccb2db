// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use brickyard::{
    cluster::control::ClusterCommand,
    config::Config,
    job::control::JobCommand,
    path::default_config_file,
    remote::{ClusterService, JobService, LibraryService},
    resolve::resolve_cluster,
    settings::HasClusterName,
    transfer::upload_file,
    workspace::{Invocation, Workspace},
};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, process::exit, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "brickyard [options] <brickyard-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let config = match &self.global.config {
            Some(path) => Config::load(path)?,
            None => Config::load(default_config_file()?)?,
        };
        let invocation = Invocation {
            environment: self.global.environment,
            standalone: self.global.no_project,
            context_file: self.global.context_file,
        };
        let workspace = Workspace::open(config, &invocation)?;

        let cancel = workspace.cancel_token().clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancel pending waits");
                cancel.cancel();
            }
        });

        match self.command {
            Command::Prepare => run_prepare(&workspace),
            Command::Validate(opts) => run_validate(&workspace, opts),
            Command::Job(JobCommands::Upsert(opts)) => run_job_upsert(&workspace, opts).await,
            Command::Job(JobCommands::Control(opts)) => run_job_control(&workspace, opts).await,
            Command::Cluster(ClusterCommands::Upsert(opts)) => {
                run_cluster_upsert(&workspace, opts).await
            }
            Command::Cluster(ClusterCommands::Control(opts)) => {
                run_cluster_control(&workspace, opts).await
            }
            Command::Library(LibraryCommands::Reconcile(opts)) => {
                run_library_reconcile(&workspace, opts).await
            }
            Command::Upload(opts) => run_upload(&workspace, opts).await,
        }
    }
}

#[derive(Args, Clone, Debug)]
struct GlobalOptions {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Target deployment environment instead of the configured one.
    #[arg(short, long, global = true, value_name = "env")]
    pub environment: Option<String>,

    /// Ignore configured project and run from persisted context.
    #[arg(long, global = true)]
    pub no_project: bool,

    /// Path to persisted environment context.
    #[arg(long, global = true, value_name = "path")]
    pub context_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Persist environment context for later standalone runs.
    #[command(override_usage = "brickyard prepare [options]")]
    Prepare,

    /// Merge and validate declared settings without touching the workspace.
    #[command(override_usage = "brickyard validate [options]")]
    Validate(ValidateOptions),

    /// Upsert or control declared jobs.
    #[command(subcommand)]
    Job(JobCommands),

    /// Upsert or control declared clusters.
    #[command(subcommand)]
    Cluster(ClusterCommands),

    /// Reconcile libraries of a cluster.
    #[command(subcommand)]
    Library(LibraryCommands),

    /// Upload file into workspace storage.
    #[command(override_usage = "brickyard upload [options] <local> <remote>")]
    Upload(UploadOptions),
}

#[derive(Debug, Clone, Subcommand)]
enum JobCommands {
    /// Create or reset declared jobs by name.
    #[command(override_usage = "brickyard job upsert [options] <settings>...")]
    Upsert(SettingsOptions),

    /// Start, stop, or restart declared jobs.
    #[command(override_usage = "brickyard job control [options] <command> <settings>...")]
    Control(ControlOptions),
}

#[derive(Debug, Clone, Subcommand)]
enum ClusterCommands {
    /// Create or update declared clusters by name.
    #[command(override_usage = "brickyard cluster upsert [options] <settings>...")]
    Upsert(SettingsOptions),

    /// Start, stop, or restart declared clusters.
    #[command(override_usage = "brickyard cluster control [options] <command> <settings>...")]
    Control(ControlOptions),
}

#[derive(Debug, Clone, Subcommand)]
enum LibraryCommands {
    /// Converge archive libraries of named cluster.
    #[command(override_usage = "brickyard library reconcile [options] <cluster_name> [<path>]...")]
    Reconcile(ReconcileOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SettingsOptions {
    /// Settings files or glob patterns matching them.
    #[arg(required = true, value_name = "settings")]
    pub settings: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ControlOptions {
    /// Command to carry out, one of start, stop, restart.
    #[arg(required = true, value_name = "command")]
    pub command: String,

    /// Settings files or glob patterns matching them.
    #[arg(required = true, value_name = "settings")]
    pub settings: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ValidateOptions {
    /// Job settings files or glob patterns matching them.
    #[arg(short, long, value_name = "settings")]
    pub jobs: Vec<String>,

    /// Cluster settings files or glob patterns matching them.
    #[arg(short = 'C', long, value_name = "settings")]
    pub clusters: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ReconcileOptions {
    /// Name of cluster to reconcile.
    #[arg(required = true, value_name = "cluster_name")]
    pub cluster_name: String,

    /// Archive paths that should be attached. Every other archive is detached.
    #[arg(value_name = "path")]
    pub paths: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UploadOptions {
    /// Local file to upload.
    #[arg(required = true, value_name = "local")]
    pub local: PathBuf,

    /// Remote path to put file at.
    #[arg(required = true, value_name = "remote")]
    pub remote: String,

    /// Replace existing remote file.
    #[arg(short, long)]
    pub overwrite: bool,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn run_prepare(workspace: &Workspace) -> Result<()> {
    let path = workspace.prepare()?;
    info!("environment context written to {:?}", path.display());

    Ok(())
}

fn run_validate(workspace: &Workspace, opts: ValidateOptions) -> Result<()> {
    if opts.jobs.is_empty() && opts.clusters.is_empty() {
        return Err(anyhow!("nothing to validate, pass --jobs or --clusters"));
    }

    let mut merged = Vec::new();
    if !opts.jobs.is_empty() {
        for job in workspace.load_jobs(&opts.jobs)? {
            let job = workspace.merger().merge_job(job)?.document;
            workspace.validator().validate_job(&job)?;
            merged.push(serde_json::to_value(job)?);
        }
    }
    if !opts.clusters.is_empty() {
        for cluster in workspace.load_clusters(&opts.clusters)? {
            let cluster = workspace.merger().merge_cluster(cluster)?.document;
            workspace.validator().validate_cluster(&cluster)?;
            merged.push(serde_json::to_value(cluster)?);
        }
    }

    println!("{}", serde_json::to_string_pretty(&merged)?);
    info!("{} settings documents are valid", merged.len());

    Ok(())
}

async fn run_job_upsert(workspace: &Workspace, opts: SettingsOptions) -> Result<()> {
    let declared = workspace.load_jobs(&opts.settings)?;
    let jobs: Arc<dyn JobService> = workspace.connect()?;
    let records = workspace.job_orchestrator(jobs)?.upsert(declared).await?;
    for record in records {
        println!("{}\t{}", record.job_id, record.name);
    }

    Ok(())
}

async fn run_job_control(workspace: &Workspace, opts: ControlOptions) -> Result<()> {
    let command: JobCommand = opts.command.parse()?;
    let declared = workspace.load_jobs(&opts.settings)?;
    let jobs: Arc<dyn JobService> = workspace.connect()?;
    workspace
        .job_orchestrator(jobs)?
        .control(declared, command)
        .await?;

    Ok(())
}

async fn run_cluster_upsert(workspace: &Workspace, opts: SettingsOptions) -> Result<()> {
    let declared = workspace.load_clusters(&opts.settings)?;
    let client = workspace.connect()?;
    let clusters: Arc<dyn ClusterService> = client.clone();
    let libraries: Arc<dyn LibraryService> = client;
    let reports = workspace
        .cluster_orchestrator(clusters, libraries)
        .upsert_all(declared)
        .await?;

    let failed = reports
        .iter()
        .filter(|report| !report.outcome.is_success())
        .count();
    for report in &reports {
        if let Some(cluster_id) = report.outcome.cluster_id() {
            println!("{cluster_id}\t{}", report.name);
        }
    }
    if failed > 0 {
        return Err(anyhow!("{failed} of {} clusters did not converge", reports.len()));
    }

    Ok(())
}

async fn run_cluster_control(workspace: &Workspace, opts: ControlOptions) -> Result<()> {
    let command: ClusterCommand = opts.command.parse()?;
    let declared = workspace.load_clusters(&opts.settings)?;
    let client = workspace.connect()?;
    let clusters: Arc<dyn ClusterService> = client.clone();
    let libraries: Arc<dyn LibraryService> = client;
    let orchestrator = workspace.cluster_orchestrator(clusters, libraries);

    let prepared = orchestrator.prepare(declared)?;
    let names = prepared
        .iter()
        .map(|cluster| cluster.cluster_name())
        .collect::<Vec<_>>();
    orchestrator.control(&names, command).await?;

    Ok(())
}

async fn run_library_reconcile(workspace: &Workspace, opts: ReconcileOptions) -> Result<()> {
    let client = workspace.connect()?;
    let cluster_id = resolve_cluster(&*client, &opts.cluster_name)
        .await?
        .ok_or_else(|| anyhow!("no cluster named {:?}", opts.cluster_name))?;

    let clusters: Arc<dyn ClusterService> = client.clone();
    let libraries: Arc<dyn LibraryService> = client;
    let plan = workspace
        .library_reconciler(clusters, libraries)
        .reconcile(&cluster_id, &opts.paths)
        .await?;
    info!(
        "cluster {:?} attached {}, detached {}, rejected {}",
        opts.cluster_name,
        plan.to_install.len(),
        plan.to_remove.len(),
        plan.rejected.len()
    );

    Ok(())
}

async fn run_upload(workspace: &Workspace, opts: UploadOptions) -> Result<()> {
    let client = workspace.connect()?;
    upload_file(&*client, &opts.local, &opts.remote, opts.overwrite).await?;

    Ok(())
}
