use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use glob::Pattern;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, ShipError};
use crate::fs::FileSystem;
use crate::task::{Completion, FileTask, UploadOutcome};
use crate::telemetry;

/// Summary of one directory scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Matching files seen on disk.
    pub matched: usize,
    /// Files newly pushed onto the task queue.
    pub enqueued: usize,
    /// Matching files skipped because they were already in flight.
    pub already_in_flight: usize,
    /// Matching files left for a later scan because the in-flight cap was reached.
    pub deferred: usize,
    /// Completions retired while waiting for room on the task queue.
    pub retired_while_waiting: usize,
}

/// Discovers eligible files and owns the in-flight set.
///
/// The in-flight set is only touched from the coordinator's own loop: a name
/// is inserted right before it is queued and removed when its completion
/// arrives, so a file can never be queued twice at the same time.
pub struct Coordinator {
    config: Arc<PipelineConfig>,
    fs: Arc<dyn FileSystem>,
    pattern: Pattern,
    in_flight: HashSet<FileTask>,
    tasks: mpsc::Sender<FileTask>,
    completions: mpsc::Receiver<Completion>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("watch_dir", &self.config.watch_dir)
            .field("pattern", &self.pattern.as_str())
            .field("in_flight", &self.in_flight.len())
            .field("task_capacity", &self.tasks.capacity())
            .finish()
    }
}

impl Coordinator {
    /// Coordinator feeding `tasks` and retiring from `completions`.
    ///
    /// Fails when the configured pattern is not a valid glob.
    pub fn new(
        config: Arc<PipelineConfig>,
        fs: Arc<dyn FileSystem>,
        tasks: mpsc::Sender<FileTask>,
        completions: mpsc::Receiver<Completion>,
    ) -> Result<Self> {
        let pattern = Pattern::new(&config.pattern)?;
        Ok(Self {
            config,
            fs,
            pattern,
            in_flight: HashSet::new(),
            tasks,
            completions,
        })
    }

    /// Files queued or being uploaded right now.
    pub fn in_flight(&self) -> &HashSet<FileTask> {
        &self.in_flight
    }

    /// Whether `task` is currently tracked.
    pub fn is_in_flight(&self, task: &FileTask) -> bool {
        self.in_flight.contains(task)
    }

    /// Main loop: scan on every tick, retire completions as they arrive, and
    /// exit once `shutdown` is cancelled. The in-flight set is dropped as is.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let period = self.config.scan_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            target: "gzship::coordinator",
            dir = %self.config.watch_dir.display(),
            pattern = %self.pattern,
            interval_ms = period.as_millis() as u64,
            "coordinator started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(completion) = self.completions.recv() => self.retire(completion),
                _ = ticker.tick() => match self.scan_once(&shutdown).await {
                    Ok(report) => {
                        if report.enqueued > 0 || report.deferred > 0 {
                            debug!(
                                target: "gzship::coordinator",
                                matched = report.matched,
                                enqueued = report.enqueued,
                                in_flight = self.in_flight.len(),
                                deferred = report.deferred,
                                "scan complete"
                            );
                        }
                    }
                    Err(ShipError::Cancelled(_)) => break,
                    Err(ShipError::ChannelClosed(which)) => {
                        warn!(
                            target: "gzship::coordinator",
                            channel = which,
                            "no workers left; stopping"
                        );
                        break;
                    }
                    Err(err) => {
                        warn!(
                            target: "gzship::coordinator",
                            error = %err,
                            "scan failed; skipping this tick"
                        );
                    }
                },
            }
        }

        info!(
            target: "gzship::coordinator",
            abandoned = self.in_flight.len(),
            "coordinator exits"
        );
    }

    /// List the watched directory and queue every matching file that is not
    /// already in flight.
    ///
    /// A listing failure returns an error before any state changes. While the
    /// task queue is full the coordinator keeps retiring completions so that
    /// workers blocked on a full completion queue can make progress.
    pub async fn scan_once(&mut self, shutdown: &CancellationToken) -> Result<ScanReport> {
        let discovered = match self.discover().await {
            Ok(found) => {
                telemetry::record_scan(true);
                found
            }
            Err(err) => {
                telemetry::record_scan(false);
                return Err(err);
            }
        };

        let mut report = ScanReport {
            matched: discovered.len(),
            ..ScanReport::default()
        };

        for task in discovered {
            if self.in_flight.contains(&task) {
                report.already_in_flight += 1;
                continue;
            }
            if let Some(max) = self.config.max_in_flight
                && self.in_flight.len() >= max
            {
                report.deferred += 1;
                continue;
            }

            self.in_flight.insert(task.clone());
            report.retired_while_waiting += self.enqueue(task, shutdown).await?;
            report.enqueued += 1;
            telemetry::record_enqueued();
        }

        telemetry::record_in_flight(self.in_flight.len());
        Ok(report)
    }

    /// Remove a finished task from the in-flight set, whatever its outcome.
    pub fn retire(&mut self, completion: Completion) {
        let Completion { task, outcome } = completion;
        if !self.in_flight.remove(&task) {
            warn!(
                target: "gzship::coordinator",
                file = %task,
                "completion for a file that was not in flight"
            );
        }

        match &outcome {
            UploadOutcome::Uploaded { bytes, removed } => {
                debug!(
                    target: "gzship::coordinator",
                    file = %task,
                    bytes,
                    removed,
                    "upload retired"
                );
            }
            UploadOutcome::RetryableFailure(reason) => {
                debug!(
                    target: "gzship::coordinator",
                    file = %task,
                    reason = %reason,
                    "failed upload retired; eligible on next scan"
                );
            }
            UploadOutcome::PermanentFailure(reason) => {
                debug!(
                    target: "gzship::coordinator",
                    file = %task,
                    reason = %reason,
                    "failed upload retired"
                );
            }
        }
        telemetry::record_in_flight(self.in_flight.len());
    }

    async fn discover(&self) -> Result<Vec<FileTask>> {
        let dir = &self.config.watch_dir;
        let entries = self.fs.list_dir(dir).await.map_err(|err| ShipError::Scan {
            path: dir.clone(),
            reason: err.to_string(),
        })?;

        let mut tasks: Vec<FileTask> = entries
            .into_iter()
            .filter(|entry| entry.is_file && self.pattern.matches(&entry.name))
            .map(|entry| FileTask::new(entry.name))
            .collect();
        // Directory order is unspecified; queue in name order for predictability.
        tasks.sort();
        Ok(tasks)
    }

    /// Push one task, retiring completions while the queue is full. Returns the
    /// number of completions retired meanwhile.
    async fn enqueue(&mut self, task: FileTask, shutdown: &CancellationToken) -> Result<usize> {
        let tasks = self.tasks.clone();
        let mut retired = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    return Err(ShipError::Cancelled("shutdown while enqueueing".into()));
                }
                permit = tasks.reserve() => {
                    let permit = permit.map_err(|_| ShipError::ChannelClosed("task queue"))?;
                    permit.send(task);
                    return Ok(retired);
                }
                Some(completion) = self.completions.recv() => {
                    self.retire(completion);
                    retired += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::queue::PipelineChannels;
    use crate::task::FailureReason;
    use std::time::Duration;
    use url::Url;

    const DIR: &str = "/spool";

    fn config() -> PipelineConfig {
        PipelineConfig::new(Url::parse("http://localhost:8080/").unwrap())
            .with_watch_dir(DIR)
            .with_scan_interval(Duration::from_millis(10))
    }

    struct Harness {
        fs: Arc<InMemoryFs>,
        coordinator: Coordinator,
        task_rx: crate::queue::TaskReceiver,
        completion_tx: mpsc::Sender<Completion>,
    }

    fn harness(config: PipelineConfig) -> Harness {
        let fs = Arc::new(InMemoryFs::new());
        let channels = PipelineChannels::bounded(config.queue_capacity);
        let coordinator = Coordinator::new(
            Arc::new(config),
            fs.clone(),
            channels.task_tx,
            channels.completion_rx,
        )
        .unwrap();
        Harness {
            fs,
            coordinator,
            task_rx: channels.task_rx,
            completion_tx: channels.completion_tx,
        }
    }

    async fn drain(rx: &crate::queue::TaskReceiver) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(Some(task)) =
            tokio::time::timeout(Duration::from_millis(20), rx.recv()).await
        {
            names.push(task.name().to_string());
        }
        names
    }

    fn uploaded(name: &str) -> Completion {
        Completion {
            task: FileTask::new(name),
            outcome: UploadOutcome::Uploaded {
                bytes: 1,
                removed: true,
            },
        }
    }

    #[tokio::test]
    async fn scan_enqueues_matching_files_once() {
        let mut h = harness(config());
        h.fs.add_file("/spool/a.gz", "a");
        h.fs.add_file("/spool/b.gz", "b");
        h.fs.add_file("/spool/notes.txt", "n");
        h.fs.add_dir("/spool/archive.gz");
        let token = CancellationToken::new();

        let report = h.coordinator.scan_once(&token).await.unwrap();
        assert_eq!(report.matched, 2);
        assert_eq!(report.enqueued, 2);
        assert_eq!(drain(&h.task_rx).await, vec!["a.gz", "b.gz"]);

        let report = h.coordinator.scan_once(&token).await.unwrap();
        assert_eq!(report.enqueued, 0);
        assert_eq!(report.already_in_flight, 2);
        assert!(drain(&h.task_rx).await.is_empty());
        assert_eq!(h.coordinator.in_flight().len(), 2);
    }

    #[tokio::test]
    async fn failed_upload_is_requeued_after_retirement() {
        let mut h = harness(config());
        h.fs.add_file("/spool/a.gz", "a");
        h.fs.add_file("/spool/b.gz", "b");
        let token = CancellationToken::new();

        h.coordinator.scan_once(&token).await.unwrap();
        assert_eq!(drain(&h.task_rx).await, vec!["a.gz", "b.gz"]);

        // a.gz succeeded and is gone from disk; b.gz got a 500 and stays.
        h.fs.remove("/spool/a.gz");
        h.coordinator.retire(uploaded("a.gz"));
        h.coordinator.retire(Completion {
            task: FileTask::new("b.gz"),
            outcome: UploadOutcome::failed(FailureReason::Status(500)),
        });
        assert!(h.coordinator.in_flight().is_empty());

        let report = h.coordinator.scan_once(&token).await.unwrap();
        assert_eq!(report.enqueued, 1);
        assert_eq!(drain(&h.task_rx).await, vec!["b.gz"]);
        assert!(h.coordinator.is_in_flight(&FileTask::new("b.gz")));
    }

    #[tokio::test]
    async fn listing_failure_leaves_state_untouched() {
        let mut h = harness(config());
        h.fs.add_file("/spool/a.gz", "a");
        let token = CancellationToken::new();
        h.coordinator.scan_once(&token).await.unwrap();
        drain(&h.task_rx).await;

        h.fs.add_file("/spool/b.gz", "b");
        h.fs.set_fail_listing(true);
        let err = h.coordinator.scan_once(&token).await.unwrap_err();
        assert!(matches!(err, ShipError::Scan { .. }));
        assert_eq!(h.coordinator.in_flight().len(), 1);
        assert!(drain(&h.task_rx).await.is_empty());

        h.fs.set_fail_listing(false);
        let report = h.coordinator.scan_once(&token).await.unwrap();
        assert_eq!(report.enqueued, 1);
        assert_eq!(drain(&h.task_rx).await, vec!["b.gz"]);
    }

    #[tokio::test]
    async fn in_flight_cap_defers_extra_files() {
        let mut h = harness(config().with_max_in_flight(Some(2)));
        for name in ["a.gz", "b.gz", "c.gz"] {
            h.fs.add_file(format!("/spool/{name}"), name);
        }
        let token = CancellationToken::new();

        let report = h.coordinator.scan_once(&token).await.unwrap();
        assert_eq!(report.enqueued, 2);
        assert_eq!(report.deferred, 1);
        assert_eq!(drain(&h.task_rx).await, vec!["a.gz", "b.gz"]);

        h.fs.remove("/spool/a.gz");
        h.coordinator.retire(uploaded("a.gz"));
        let report = h.coordinator.scan_once(&token).await.unwrap();
        assert_eq!(report.enqueued, 1);
        assert_eq!(drain(&h.task_rx).await, vec!["c.gz"]);
    }

    #[tokio::test]
    async fn full_task_queue_keeps_retiring_completions() {
        let mut h = harness(config().with_queue_capacity(1));
        h.fs.add_file("/spool/a.gz", "a");
        h.fs.add_file("/spool/b.gz", "b");
        let token = CancellationToken::new();

        // Occupy the only slot and leave its completion waiting.
        h.coordinator.tasks.send(FileTask::new("stale.gz")).await.unwrap();
        h.coordinator.in_flight.insert(FileTask::new("stale.gz"));
        h.completion_tx.send(uploaded("stale.gz")).await.unwrap();

        let task_rx = h.task_rx.clone();
        let consumer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let mut seen = Vec::new();
            while seen.len() < 3 {
                match task_rx.recv().await {
                    Some(task) => seen.push(task.name().to_string()),
                    None => break,
                }
            }
            seen
        });

        let report = h.coordinator.scan_once(&token).await.unwrap();
        assert_eq!(report.enqueued, 2);
        assert_eq!(report.retired_while_waiting, 1);
        assert!(!h.coordinator.is_in_flight(&FileTask::new("stale.gz")));
        assert_eq!(h.coordinator.in_flight().len(), 2);

        let seen = consumer.await.unwrap();
        assert_eq!(seen, vec!["stale.gz", "a.gz", "b.gz"]);
    }

    #[tokio::test]
    async fn cancelled_while_blocked_on_full_queue() {
        let mut h = harness(config().with_queue_capacity(1));
        h.fs.add_file("/spool/a.gz", "a");
        h.fs.add_file("/spool/b.gz", "b");
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = h.coordinator.scan_once(&token).await.unwrap_err();
        assert!(matches!(err, ShipError::Cancelled(_)));
    }

    #[tokio::test]
    async fn run_loop_scans_retires_and_stops() {
        let h = harness(config());
        h.fs.add_file("/spool/a.gz", "a");
        let token = CancellationToken::new();
        let handle = tokio::spawn(h.coordinator.run(token.clone()));

        let first = tokio::time::timeout(Duration::from_secs(2), h.task_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.name(), "a.gz");

        // Still in flight: several ticks pass without a duplicate.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(drain(&h.task_rx).await.is_empty());

        // Failure retired with the file still present: it comes back.
        h.completion_tx
            .send(Completion {
                task: first,
                outcome: UploadOutcome::failed(FailureReason::Transport("reset".into())),
            })
            .await
            .unwrap();
        let again = tokio::time::timeout(Duration::from_secs(2), h.task_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.name(), "a.gz");

        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
