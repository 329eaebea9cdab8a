use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use gzship_core::PipelineConfig;
use url::Url;

/// Collector address used when none is configured.
pub const DEFAULT_UPLOAD_ADDRESS: &str = "localhost:8080";
/// Monitor listen address used when none is configured.
pub const DEFAULT_MONITOR_LISTEN_ADDRESS: &str = ":9211";

/// Fully resolved configuration for one gzship process.
#[derive(Debug, Clone)]
pub struct GzshipConfig {
    /// Where files are sent.
    pub upload: UploadConfig,
    /// Monitoring endpoint settings.
    pub monitor: MonitorConfig,
    /// What is scanned and how often.
    pub scan: ScanConfig,
    /// Upload worker pool settings.
    pub workers: WorkerConfig,
    /// Where the values came from.
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
/// Collector settings.
pub struct UploadConfig {
    /// Address as configured, before resolution.
    pub address: String,
    /// Base URL files are PUT under.
    pub base_url: Url,
    /// Per-request timeout, if any.
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
/// Monitoring endpoint settings.
pub struct MonitorConfig {
    /// Address the endpoint binds.
    pub listen_address: SocketAddr,
}

#[derive(Debug, Clone)]
/// Directory scan settings.
pub struct ScanConfig {
    /// Directory holding finished files.
    pub watch_dir: PathBuf,
    /// Glob matched against file names.
    pub pattern: String,
    /// Delay between scans.
    pub interval: Duration,
    /// Optional cap on tracked in-flight files.
    pub max_in_flight: Option<usize>,
}

#[derive(Debug, Clone)]
/// Upload worker pool settings.
pub struct WorkerConfig {
    /// Number of workers.
    pub count: usize,
    /// Capacity of the task and completion queues.
    pub queue_capacity: usize,
    /// Time shutdown waits for loops.
    pub shutdown_grace: Duration,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    /// Configuration file that was read.
    pub config_path: Option<PathBuf>,
    /// Whether a `.env` file was read.
    pub env_file_loaded: bool,
}

impl GzshipConfig {
    /// Settings handed to the upload pipeline.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(self.upload.base_url.clone())
            .with_watch_dir(self.scan.watch_dir.clone())
            .with_pattern(self.scan.pattern.clone())
            .with_scan_interval(self.scan.interval)
            .with_max_in_flight(self.scan.max_in_flight)
            .with_workers(self.workers.count)
            .with_queue_capacity(self.workers.queue_capacity)
            .with_shutdown_grace(self.workers.shutdown_grace)
            .with_request_timeout(self.upload.request_timeout)
    }
}
