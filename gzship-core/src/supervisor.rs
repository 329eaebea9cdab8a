use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::fs::FileSystem;
use crate::queue::PipelineChannels;
use crate::uploader::Uploader;
use crate::worker::UploadWorker;

/// How each supervised loop ended during shutdown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Loops that exited within the grace period.
    pub finished: Vec<String>,
    /// Loops that were still running after the grace period and got aborted.
    pub timed_out: Vec<String>,
    /// Loops that panicked.
    pub panicked: Vec<String>,
}

impl ShutdownReport {
    /// True when every loop exited on its own.
    pub fn is_clean(&self) -> bool {
        self.timed_out.is_empty() && self.panicked.is_empty()
    }
}

struct SupervisedLoop {
    name: String,
    handle: JoinHandle<()>,
}

/// Owns the coordinator and upload worker tasks for the life of the process.
pub struct PipelineSupervisor {
    config: Arc<PipelineConfig>,
    shutdown_token: CancellationToken,
    loops: Vec<SupervisedLoop>,
}

impl fmt::Debug for PipelineSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.loops.iter().map(|l| l.name.as_str()).collect();
        f.debug_struct("PipelineSupervisor")
            .field("config", &self.config)
            .field("loops", &names)
            .field("shutdown_cancelled", &self.shutdown_token.is_cancelled())
            .finish()
    }
}

impl PipelineSupervisor {
    /// Validate `config`, wire the queues and spawn one coordinator plus
    /// `config.workers` upload workers. Must be called inside a Tokio runtime.
    pub fn start(
        config: PipelineConfig,
        fs: Arc<dyn FileSystem>,
        uploader: Arc<dyn Uploader>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let shutdown_token = CancellationToken::new();
        let channels = PipelineChannels::bounded(config.queue_capacity);

        let coordinator = Coordinator::new(
            Arc::clone(&config),
            Arc::clone(&fs),
            channels.task_tx,
            channels.completion_rx,
        )?;

        let mut loops = Vec::with_capacity(config.workers + 1);
        loops.push(SupervisedLoop {
            name: "coordinator".to_string(),
            handle: tokio::spawn(coordinator.run(shutdown_token.child_token())),
        });

        for id in 0..config.workers {
            let worker = UploadWorker::new(
                id,
                Arc::clone(&config),
                Arc::clone(&fs),
                Arc::clone(&uploader),
                channels.task_rx.clone(),
                channels.completion_tx.clone(),
            );
            loops.push(SupervisedLoop {
                name: format!("worker-{id}"),
                handle: tokio::spawn(worker.run(shutdown_token.child_token())),
            });
        }

        info!(
            target: "gzship::supervisor",
            workers = config.workers,
            dir = %config.watch_dir.display(),
            upload = %config.upload_base_url,
            "pipeline started"
        );

        Ok(Self {
            config,
            shutdown_token,
            loops,
        })
    }

    /// Token cancelled when shutdown begins. Cancelling it from outside stops
    /// every loop as well.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Number of spawned loops, coordinator included.
    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    /// Run until `stop` resolves, then shut down.
    pub async fn run_until<F>(self, stop: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        let token = self.shutdown_token.clone();
        tokio::select! {
            _ = stop => info!(target: "gzship::supervisor", "stop requested"),
            _ = token.cancelled() => {
                info!(target: "gzship::supervisor", "shutdown token cancelled")
            }
        }
        self.shutdown().await
    }

    /// Signal every loop and wait for it. Loops share one grace period; any
    /// loop still running when it ends is aborted. Files in flight are left on
    /// disk for the next run.
    pub async fn shutdown(self) -> ShutdownReport {
        info!(target: "gzship::supervisor", loops = self.loops.len(), "shutting down pipeline");
        self.shutdown_token.cancel();

        let grace = self.config.shutdown_grace;
        let deadline = Instant::now() + grace;
        let mut report = ShutdownReport::default();
        for SupervisedLoop { name, mut handle } in self.loops {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => report.finished.push(name),
                Ok(Err(err)) if err.is_panic() => {
                    error!(target: "gzship::supervisor", task = %name, "loop panicked");
                    report.panicked.push(name);
                }
                Ok(Err(err)) => {
                    warn!(
                        target: "gzship::supervisor",
                        task = %name,
                        error = %err,
                        "loop was cancelled"
                    );
                    report.finished.push(name);
                }
                Err(_) => {
                    warn!(
                        target: "gzship::supervisor",
                        task = %name,
                        grace_secs = grace.as_secs(),
                        "loop did not stop in time; aborting"
                    );
                    handle.abort();
                    report.timed_out.push(name);
                }
            }
        }

        info!(
            target: "gzship::supervisor",
            finished = report.finished.len(),
            timed_out = report.timed_out.len(),
            panicked = report.panicked.len(),
            "pipeline stopped"
        );
        report
    }
}
