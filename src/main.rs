mod cli;
mod config;
mod error;
mod kube;
mod lifecycle;
mod notify;
mod ui;
mod watcher;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use cli::{Cli, Command, ModeArg};
use config::TrainwatchConfig;
use error::WatchError;
use kube::{JobStore, JobsApi};
use lifecycle::{classify, DeliveryMarkers, JobDescriptor};
use notify::{GitHubClient, GitHubSink, MlflowClient};
use ui::StatusView;
use watcher::{WatchOptions, WatchOutcome, Watcher};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = TrainwatchConfig::load()?;
    if let Some(namespace) = &cli.namespace {
        config.watch.namespace = namespace.clone();
    }

    match cli.command {
        Command::Watch {
            job,
            timeout,
            mode,
            interval,
            show_logs,
        } => cmd_watch(&config, job, timeout, mode, interval, show_logs).await?,
        Command::Status { job } => cmd_status(&config, &job).await?,
        Command::Logs { job } => cmd_logs(&config, &job).await?,
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "trainwatch=debug"
    } else {
        "trainwatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

/// Connect to the job store. Failure here is fatal: without cluster
/// access no partial operation is attempted.
fn build_store(config: &TrainwatchConfig) -> Result<JobsApi, WatchError> {
    let api = match &config.cluster {
        Some(cluster) => JobsApi::from_cluster_config(cluster, &config.watch.namespace)?,
        None => JobsApi::in_cluster(&config.watch.namespace)?,
    };
    Ok(api)
}

fn build_sink(config: &TrainwatchConfig) -> Result<GitHubSink, WatchError> {
    if config.github.token.is_empty() {
        return Err(WatchError::Config(
            "github token not configured (set GITHUB_TOKEN or [github] token)".into(),
        ));
    }
    if config.github.repo.is_empty() {
        return Err(WatchError::Config(
            "github repo not configured (set GITHUB_REPO or [github] repo)".into(),
        ));
    }
    let github = GitHubClient::new(config.github.token.clone(), config.github.repo.clone());
    let mlflow = MlflowClient::new(config.mlflow.tracking_url.clone());
    Ok(GitHubSink::new(
        github,
        Some(mlflow),
        config.mlflow.default_experiment.clone(),
        config.github.dispatch,
    ))
}

async fn cmd_watch(
    config: &TrainwatchConfig,
    job: Option<String>,
    timeout: Option<u64>,
    mode: ModeArg,
    interval: Option<u64>,
    show_logs: bool,
) -> Result<(), WatchError> {
    let store = build_store(config)?;
    let log_store = store.clone();
    let sink = build_sink(config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let opts = WatchOptions {
        job,
        timeout: Duration::from_secs(timeout.unwrap_or(config.watch.timeout_secs)),
        poll_interval: Duration::from_secs(interval.unwrap_or(config.watch.poll_interval_secs)),
    };
    info!(
        namespace = %config.watch.namespace,
        ?mode,
        job = ?opts.job,
        "starting watch"
    );

    let watcher = Watcher::new(store, sink, shutdown_rx);
    let outcome = match mode {
        ModeArg::Watch => watcher.run(&opts).await,
        ModeArg::Poll => watcher.run_poll(&opts).await,
    };

    StatusView::new().print_outcome(&outcome);

    if show_logs
        && matches!(outcome, WatchOutcome::Completed(_))
        && let Some(job) = &opts.job
    {
        let logs = log_store.job_logs(job).await?;
        println!("{logs}");
    }
    Ok(())
}

async fn cmd_status(config: &TrainwatchConfig, job: &str) -> Result<(), WatchError> {
    let store = build_store(config)?;
    let object = store.fetch(job).await?;
    let phase = classify(object.as_ref());
    match object {
        Some(object) => {
            let descriptor = JobDescriptor::from_object(&object);
            let markers = DeliveryMarkers::from_annotations(&object.metadata.annotations);
            StatusView::new().print_job(&descriptor, phase, &markers);
        }
        None => println!(
            "job '{job}' not found in namespace '{}'",
            config.watch.namespace
        ),
    }
    Ok(())
}

async fn cmd_logs(config: &TrainwatchConfig, job: &str) -> Result<(), WatchError> {
    let store = build_store(config)?;
    let logs = store.job_logs(job).await?;
    println!("{logs}");
    Ok(())
}
