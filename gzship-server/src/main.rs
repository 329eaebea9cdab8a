//! # gzship
//!
//! Watches a directory for finished `.gz` files, PUTs each one to a collector
//! and deletes it once the collector answers `200 OK`. Files that fail stay on
//! disk and are retried on a later scan.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gzship_config::{ConfigLoad, GzshipConfig};
use gzship_core::{HttpUploader, PipelineSupervisor, RealFs};
use gzship_server::{
    cli::Cli,
    logging,
    monitor::{self, MonitorState},
    signals,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let ConfigLoad { config, warnings } = cli
        .config_loader()
        .load()
        .context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.config_path.as_ref() {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => warn!(message = %warning.message, hint = %hint, "configuration warning"),
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    run(config).await
}

async fn run(config: GzshipConfig) -> anyhow::Result<()> {
    let metrics = monitor::install_recorder().context("failed to install metrics recorder")?;

    let listener = TcpListener::bind(config.monitor.listen_address)
        .await
        .with_context(|| {
            format!(
                "failed to bind monitor endpoint on {}",
                config.monitor.listen_address
            )
        })?;
    let monitor_shutdown = CancellationToken::new();
    let monitor_task = tokio::spawn(monitor::serve(
        listener,
        MonitorState::new(metrics),
        monitor_shutdown.clone(),
    ));

    let pipeline = config.pipeline_config();
    let uploader = Arc::new(HttpUploader::new(&pipeline).context("failed to build HTTP client")?);
    let supervisor = PipelineSupervisor::start(pipeline, Arc::new(RealFs::new()), uploader)
        .context("failed to start upload pipeline")?;

    let report = supervisor.run_until(signals::shutdown_signal()).await;

    monitor_shutdown.cancel();
    match monitor_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(target: "gzship::monitor", error = %err, "monitor endpoint failed"),
        Err(err) => error!(target: "gzship::monitor", error = %err, "monitor task panicked"),
    }

    if report.is_clean() {
        info!("gzship stopped");
    } else {
        warn!(
            timed_out = ?report.timed_out,
            panicked = ?report.panicked,
            "gzship stopped with unfinished loops"
        );
    }
    Ok(())
}
