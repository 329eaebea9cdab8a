use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use gzship_config::{ConfigLoader, ConfigOverrides, util::parse_duration};

/// Ship finished `.gz` files from a directory to an HTTP collector.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gzship", version)]
pub struct Cli {
    /// Path to a gzship.toml configuration file
    #[arg(long, env = "GZSHIP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to a .env file loaded before reading the environment
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Address for the /metrics, /health and /version endpoints
    #[arg(long = "monitor.listen-address", env = "GZSHIP_MONITOR_LISTEN_ADDRESS")]
    pub monitor_listen_address: Option<String>,

    /// Collector address; files are PUT to http://<address>/<file name>
    #[arg(long = "upload.address", env = "GZSHIP_UPLOAD_ADDRESS")]
    pub upload_address: Option<String>,

    /// Delay between directory scans, in seconds or as e.g. "500ms"
    #[arg(long = "scan.interval", env = "GZSHIP_SCAN_INTERVAL_SECS", value_parser = parse_duration)]
    pub scan_interval: Option<Duration>,

    /// Directory to scan
    #[arg(long, env = "GZSHIP_WATCH_DIR")]
    pub watch_dir: Option<PathBuf>,

    /// Glob matched against file names in the watched directory
    #[arg(long, env = "GZSHIP_PATTERN")]
    pub pattern: Option<String>,

    /// Number of concurrent upload workers
    #[arg(long, env = "GZSHIP_WORKERS")]
    pub workers: Option<usize>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            upload_address: self.upload_address.clone(),
            monitor_listen_address: self.monitor_listen_address.clone(),
            scan_interval: self.scan_interval,
            watch_dir: self.watch_dir.clone(),
            pattern: self.pattern.clone(),
            workers: self.workers,
        }
    }

    /// Configuration loader seeded with the command-line paths and overrides.
    pub fn config_loader(&self) -> ConfigLoader {
        let mut loader = ConfigLoader::new().with_overrides(self.overrides());
        if let Some(path) = &self.config {
            loader = loader.with_config_path(path);
        }
        if let Some(path) = &self.env_file {
            loader = loader.with_env_file(path);
        }
        loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_flags_map_to_overrides() {
        let cli = Cli::try_parse_from([
            "gzship",
            "--upload.address",
            "collector:9000",
            "--monitor.listen-address",
            ":9300",
            "--scan.interval",
            "250ms",
            "--workers",
            "3",
            "--watch-dir",
            "/var/spool/out",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.upload_address.as_deref(), Some("collector:9000"));
        assert_eq!(overrides.monitor_listen_address.as_deref(), Some(":9300"));
        assert_eq!(overrides.scan_interval, Some(Duration::from_millis(250)));
        assert_eq!(overrides.workers, Some(3));
        assert_eq!(overrides.watch_dir, Some(PathBuf::from("/var/spool/out")));
        assert!(overrides.pattern.is_none());
    }

    #[test]
    fn plain_seconds_are_accepted_for_interval() {
        let cli = Cli::try_parse_from(["gzship", "--scan.interval", "5"]).unwrap();
        assert_eq!(cli.scan_interval, Some(Duration::from_secs(5)));
    }

    #[test]
    fn bad_interval_is_rejected() {
        assert!(Cli::try_parse_from(["gzship", "--scan.interval", "soon"]).is_err());
    }
}
