use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    /// `[upload]` section.
    #[serde(default)]
    pub upload: FileUploadConfig,
    /// `[monitor]` section.
    #[serde(default)]
    pub monitor: FileMonitorConfig,
    /// `[scan]` section.
    #[serde(default)]
    pub scan: FileScanConfig,
    /// `[workers]` section.
    #[serde(default)]
    pub workers: FileWorkerConfig,
}

/// `[upload]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileUploadConfig {
    /// Collector `host:port` or URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Humantime duration, e.g. `"30s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
}

/// `[monitor]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileMonitorConfig {
    /// Monitor endpoint address, e.g. `":9211"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_address: Option<String>,
}

/// `[scan]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileScanConfig {
    /// Directory to scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_dir: Option<PathBuf>,
    /// File name glob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Humantime duration between scans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Cap on tracked in-flight files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,
}

/// `[workers]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileWorkerConfig {
    /// Number of upload workers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Capacity of each queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
    /// Humantime shutdown grace period.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_grace: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    /// `GZSHIP_CONFIG`.
    pub config_path: Option<PathBuf>,
    /// `GZSHIP_UPLOAD_ADDRESS`.
    pub upload_address: Option<String>,
    /// `GZSHIP_MONITOR_LISTEN_ADDRESS`.
    pub monitor_listen_address: Option<String>,
    /// `GZSHIP_SCAN_INTERVAL_SECS`.
    pub scan_interval: Option<String>,
    /// `GZSHIP_WATCH_DIR`.
    pub watch_dir: Option<PathBuf>,
    /// `GZSHIP_PATTERN`.
    pub pattern: Option<String>,
    /// `GZSHIP_WORKERS`.
    pub workers: Option<usize>,
    /// `GZSHIP_QUEUE_CAPACITY`.
    pub queue_capacity: Option<usize>,
    /// `GZSHIP_MAX_IN_FLIGHT`.
    pub max_in_flight: Option<usize>,
    /// `GZSHIP_SHUTDOWN_GRACE_SECS`.
    pub shutdown_grace: Option<String>,
    /// Variables that were set but could not be parsed.
    pub unparsed: Vec<(&'static str, String)>,
}

impl EnvConfig {
    /// Read the process environment.
    pub fn gather() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env_config = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        env_config.config_path = var("GZSHIP_CONFIG").map(PathBuf::from);
        env_config.upload_address = var("GZSHIP_UPLOAD_ADDRESS");
        env_config.monitor_listen_address = var("GZSHIP_MONITOR_LISTEN_ADDRESS");
        env_config.scan_interval = var("GZSHIP_SCAN_INTERVAL_SECS");
        env_config.watch_dir = var("GZSHIP_WATCH_DIR").map(PathBuf::from);
        env_config.pattern = var("GZSHIP_PATTERN");
        env_config.shutdown_grace = var("GZSHIP_SHUTDOWN_GRACE_SECS");

        let mut unparsed = Vec::new();
        let mut count = |key: &'static str| {
            let raw = var(key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    unparsed.push((key, raw));
                    None
                }
            }
        };
        env_config.workers = count("GZSHIP_WORKERS");
        env_config.queue_capacity = count("GZSHIP_QUEUE_CAPACITY");
        env_config.max_in_flight = count("GZSHIP_MAX_IN_FLIGHT");
        env_config.unparsed = unparsed;

        env_config
    }
}

/// Command-line values; these win over every other source.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// `--upload.address`.
    pub upload_address: Option<String>,
    /// `--monitor.listen-address`.
    pub monitor_listen_address: Option<String>,
    /// `--scan.interval`.
    pub scan_interval: Option<Duration>,
    /// `--watch-dir`.
    pub watch_dir: Option<PathBuf>,
    /// `--pattern`.
    pub pattern: Option<String>,
    /// `--workers`.
    pub workers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn env_values_are_collected() {
        let env = EnvConfig::from_lookup(lookup(&[
            ("GZSHIP_UPLOAD_ADDRESS", "collector:8080"),
            ("GZSHIP_WORKERS", "4"),
            ("GZSHIP_SCAN_INTERVAL_SECS", "5"),
            ("GZSHIP_PATTERN", ""),
        ]));
        assert_eq!(env.upload_address.as_deref(), Some("collector:8080"));
        assert_eq!(env.workers, Some(4));
        assert_eq!(env.scan_interval.as_deref(), Some("5"));
        assert!(env.pattern.is_none());
        assert!(env.unparsed.is_empty());
    }

    #[test]
    fn unparseable_counts_are_reported() {
        let env = EnvConfig::from_lookup(lookup(&[("GZSHIP_QUEUE_CAPACITY", "lots")]));
        assert!(env.queue_capacity.is_none());
        assert_eq!(env.unparsed, vec![("GZSHIP_QUEUE_CAPACITY", "lots".to_string())]);
    }

    #[test]
    fn file_config_parses_sections() {
        let raw = r#"
            [upload]
            address = "collector:9000"

            [scan]
            watch_dir = "/var/spool/metrics"
            interval = "500ms"

            [workers]
            count = 2
        "#;
        let parsed: FileConfig = toml::from_str(raw).unwrap();
        assert_eq!(parsed.upload.address.as_deref(), Some("collector:9000"));
        assert_eq!(parsed.scan.interval.as_deref(), Some("500ms"));
        assert_eq!(parsed.workers.count, Some(2));
        assert!(parsed.monitor.listen_address.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let raw = "[scan]\nintervall = \"1s\"\n";
        assert!(toml::from_str::<FileConfig>(raw).is_err());
    }
}
