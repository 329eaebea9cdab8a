use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::fs::FileSystem;
use crate::queue::TaskReceiver;
use crate::task::{Completion, FailureReason, FileTask, UploadOutcome};
use crate::telemetry;
use crate::uploader::Uploader;

/// Pulls tasks off the shared queue, uploads each file and deletes it once the
/// collector has accepted it.
///
/// Every task a worker receives produces exactly one [`Completion`], whatever
/// happened to the upload.
pub struct UploadWorker {
    id: usize,
    config: Arc<PipelineConfig>,
    fs: Arc<dyn FileSystem>,
    uploader: Arc<dyn Uploader>,
    tasks: TaskReceiver,
    completions: mpsc::Sender<Completion>,
}

impl fmt::Debug for UploadWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadWorker")
            .field("id", &self.id)
            .field("watch_dir", &self.config.watch_dir)
            .finish_non_exhaustive()
    }
}

impl UploadWorker {
    /// Worker `id` pulling from `tasks` and reporting on `completions`.
    pub fn new(
        id: usize,
        config: Arc<PipelineConfig>,
        fs: Arc<dyn FileSystem>,
        uploader: Arc<dyn Uploader>,
        tasks: TaskReceiver,
        completions: mpsc::Sender<Completion>,
    ) -> Self {
        Self {
            id,
            config,
            fs,
            uploader,
            tasks,
            completions,
        }
    }

    /// Run until `shutdown` is cancelled or the task queue closes.
    ///
    /// Shutdown is only observed between tasks; an upload that has started is
    /// carried through to its completion notice.
    pub async fn run(self, shutdown: CancellationToken) {
        debug!(target: "gzship::worker", worker_id = self.id, "upload worker started");

        loop {
            let task = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.tasks.recv() => match next {
                    Some(task) => task,
                    None => {
                        debug!(target: "gzship::worker", worker_id = self.id, "task queue closed");
                        break;
                    }
                },
            };

            let outcome = self.process(&task).await;
            if self.completions.send(Completion { task, outcome }).await.is_err() {
                warn!(
                    target: "gzship::worker",
                    worker_id = self.id,
                    "coordinator gone; dropping completion"
                );
                break;
            }
        }

        debug!(target: "gzship::worker", worker_id = self.id, "upload worker exits");
    }

    /// Upload one file and remove it on success.
    pub async fn process(&self, task: &FileTask) -> UploadOutcome {
        let path = task.path_in(&self.config.watch_dir);

        let outcome = match self.fs.open(&path).await {
            Err(err) => {
                let reason = FailureReason::open(&err);
                warn!(
                    target: "gzship::worker",
                    worker_id = self.id,
                    file = %task,
                    error = %err,
                    "could not open file"
                );
                UploadOutcome::failed(reason)
            }
            Ok(file) => {
                let bytes = file.len;
                match self.uploader.put(task, file).await {
                    Err(reason) => {
                        warn!(
                            target: "gzship::worker",
                            worker_id = self.id,
                            file = %task,
                            reason = %reason,
                            "upload failed; file kept"
                        );
                        UploadOutcome::failed(reason)
                    }
                    Ok(()) => {
                        let removed = match self.fs.remove_file(&path).await {
                            Ok(()) => true,
                            Err(err) => {
                                error!(
                                    target: "gzship::worker",
                                    worker_id = self.id,
                                    file = %task,
                                    error = %err,
                                    "uploaded file could not be removed"
                                );
                                false
                            }
                        };
                        info!(
                            target: "gzship::worker",
                            worker_id = self.id,
                            file = %task,
                            bytes,
                            "uploaded"
                        );
                        UploadOutcome::Uploaded { bytes, removed }
                    }
                }
            }
        };

        telemetry::record_outcome(&outcome);
        outcome
    }
}
