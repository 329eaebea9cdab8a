use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Result, ShipError};

/// Default delay between scans.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(1);
/// Default file name glob.
pub const DEFAULT_PATTERN: &str = "*.gz";
/// Default number of upload workers.
pub const DEFAULT_WORKERS: usize = 1;
/// Default capacity of each queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
/// Default time shutdown waits for loops to stop.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Immutable settings shared by the coordinator and every upload worker.
///
/// Built once at startup and handed out behind an `Arc`; nothing in the
/// pipeline mutates it afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Directory scanned for finished files. Uploaded files are deleted from here.
    pub watch_dir: PathBuf,
    /// Glob matched against file names in `watch_dir`.
    pub pattern: String,
    /// Collector base; each file is PUT to `<base>/<file name>`.
    pub upload_base_url: Url,
    /// Delay between directory scans.
    pub scan_interval: Duration,
    /// Number of concurrent upload workers.
    pub workers: usize,
    /// Capacity of both the task and the completion queue.
    pub queue_capacity: usize,
    /// Optional ceiling on tracked in-flight files. Discoveries beyond it wait
    /// for a later scan.
    pub max_in_flight: Option<usize>,
    /// How long shutdown waits for each loop before abandoning it.
    pub shutdown_grace: Duration,
    /// Per-request timeout for uploads. `None` lets a stalled collector hold a
    /// worker indefinitely.
    pub request_timeout: Option<Duration>,
}

impl PipelineConfig {
    /// Defaults for everything except the collector base URL.
    pub fn new(upload_base_url: Url) -> Self {
        Self {
            watch_dir: PathBuf::from("."),
            pattern: DEFAULT_PATTERN.to_string(),
            upload_base_url,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_in_flight: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            request_timeout: None,
        }
    }

    /// Set the directory to scan.
    pub fn with_watch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.watch_dir = dir.into();
        self
    }

    /// Set the file name glob.
    pub fn with_pattern<S: Into<String>>(mut self, pattern: S) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Set the delay between scans.
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Set the number of upload workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the capacity of both queues.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Cap the number of tracked in-flight files.
    pub fn with_max_in_flight(mut self, max: Option<usize>) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set a per-request upload timeout.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ShipError::InvalidConfig("at least one worker is required".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ShipError::InvalidConfig("queue capacity must be positive".into()));
        }
        if self.scan_interval.is_zero() {
            return Err(ShipError::InvalidConfig("scan interval must be positive".into()));
        }
        if self.max_in_flight == Some(0) {
            return Err(ShipError::InvalidConfig("max_in_flight must be positive when set".into()));
        }
        if self.upload_base_url.cannot_be_a_base() {
            return Err(ShipError::InvalidUrl(format!(
                "{} cannot carry a file path",
                self.upload_base_url
            )));
        }
        glob::Pattern::new(&self.pattern)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:8080/").unwrap()
    }

    #[test]
    fn defaults_match_collector_conventions() {
        let config = PipelineConfig::new(base());
        assert_eq!(config.pattern, "*.gz");
        assert_eq!(config.scan_interval, Duration::from_secs(1));
        assert_eq!(config.workers, 1);
        assert_eq!(config.queue_capacity, 10_000);
        assert!(config.max_in_flight.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unusable_settings() {
        assert!(PipelineConfig::new(base()).with_workers(0).validate().is_err());
        assert!(PipelineConfig::new(base()).with_queue_capacity(0).validate().is_err());
        assert!(
            PipelineConfig::new(base())
                .with_scan_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            PipelineConfig::new(base())
                .with_max_in_flight(Some(0))
                .validate()
                .is_err()
        );
        assert!(matches!(
            PipelineConfig::new(base()).with_pattern("[").validate(),
            Err(ShipError::InvalidPattern(_))
        ));
        let mailto = Url::parse("mailto:ops@example.com").unwrap();
        assert!(matches!(
            PipelineConfig::new(mailto).validate(),
            Err(ShipError::InvalidUrl(_))
        ));
    }
}
