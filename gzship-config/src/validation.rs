use std::time::Duration;

use thiserror::Error;

use super::models::GzshipConfig;

const LONG_SCAN_INTERVAL: Duration = Duration::from_secs(60 * 60);
const MANY_WORKERS: usize = 64;

/// Settings the pipeline cannot run with.
#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    /// `workers.count` is zero.
    #[error("at least one upload worker is required")]
    NoWorkers,
    /// `workers.queue_capacity` is zero.
    #[error("queue capacity must be greater than zero")]
    ZeroQueueCapacity,
    /// `scan.interval` is zero.
    #[error("scan interval must be greater than zero")]
    ZeroScanInterval,
    /// `scan.max_in_flight` is set to zero.
    #[error("max_in_flight must be greater than zero when set")]
    ZeroMaxInFlight,
    /// `scan.pattern` is not a valid glob.
    #[error("invalid file pattern '{pattern}'")]
    InvalidPattern {
        /// Pattern as configured.
        pattern: String,
        /// Parser error.
        #[source]
        source: glob::PatternError,
    },
    /// `upload.address` cannot be turned into an HTTP base URL.
    #[error("invalid upload address '{address}': {reason}")]
    InvalidUploadAddress {
        /// Address as configured.
        address: String,
        /// What is wrong with it.
        reason: String,
    },
    /// `monitor.listen_address` cannot be resolved to a socket address.
    #[error("invalid monitor listen address '{address}': {reason}")]
    InvalidListenAddress {
        /// Address as configured.
        address: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// A setting that is allowed but probably not intended.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// What was noticed.
    pub message: String,
    /// Suggested fix, when there is one.
    pub hint: Option<String>,
}

/// Warnings collected while loading configuration.
#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    /// Warnings in the order they were raised.
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    /// Record a warning.
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    /// Record a warning with a suggested fix.
    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append every warning from `other`.
    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    /// Iterate over the recorded warnings.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Reject unusable settings and warn about questionable ones.
pub fn apply_guard_rails(config: &GzshipConfig) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.workers.count == 0 {
        return Err(ConfigGuardRailError::NoWorkers);
    }
    if config.workers.queue_capacity == 0 {
        return Err(ConfigGuardRailError::ZeroQueueCapacity);
    }
    if config.scan.interval.is_zero() {
        return Err(ConfigGuardRailError::ZeroScanInterval);
    }
    if config.scan.max_in_flight == Some(0) {
        return Err(ConfigGuardRailError::ZeroMaxInFlight);
    }
    glob::Pattern::new(&config.scan.pattern).map_err(|source| {
        ConfigGuardRailError::InvalidPattern {
            pattern: config.scan.pattern.clone(),
            source,
        }
    })?;

    if config.scan.interval > LONG_SCAN_INTERVAL {
        warnings.push_with_hint(
            format!(
                "scan interval of {} delays every upload by up to that long",
                humantime::format_duration(config.scan.interval)
            ),
            "Intervals of a few seconds are typical",
        );
    }
    if config.workers.count > MANY_WORKERS {
        warnings.push_with_hint(
            format!("{} upload workers configured", config.workers.count),
            "Each worker holds an open connection to the collector",
        );
    }
    if let Some(max) = config.scan.max_in_flight
        && max < config.workers.count
    {
        warnings.push(format!(
            "max_in_flight ({max}) is below the worker count ({}); some workers will stay idle",
            config.workers.count
        ));
    }

    Ok(warnings)
}
