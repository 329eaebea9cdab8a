use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

use gzship_core::config::{
    DEFAULT_PATTERN, DEFAULT_QUEUE_CAPACITY, DEFAULT_SCAN_INTERVAL, DEFAULT_SHUTDOWN_GRACE,
    DEFAULT_WORKERS,
};

use super::{
    models::{
        ConfigMetadata, DEFAULT_MONITOR_LISTEN_ADDRESS, DEFAULT_UPLOAD_ADDRESS, GzshipConfig,
        MonitorConfig, ScanConfig, UploadConfig, WorkerConfig,
    },
    sources::{ConfigOverrides, EnvConfig, FileConfig},
    util::{parse_duration, resolve_listen_address, resolve_upload_url},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["gzship.toml", "config/gzship.toml"];

/// Where the loader looks for its inputs.
#[derive(Debug, Clone)]
pub struct ConfigLoaderOptions {
    /// Explicit configuration file; a missing file is then an error.
    pub config_path: Option<PathBuf>,
    /// `.env` file to read instead of the one in the working directory.
    pub env_file: Option<PathBuf>,
    /// Whether to read a `.env` file at all.
    pub load_env_file: bool,
    /// Candidates tried in order when no path was given explicitly.
    pub search_paths: Vec<PathBuf>,
}

impl Default for ConfigLoaderOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            env_file: None,
            load_env_file: true,
            search_paths: DEFAULT_CONFIG_LOCATIONS.iter().map(PathBuf::from).collect(),
        }
    }
}

/// Builds a [`GzshipConfig`] from defaults, a TOML file, the environment and
/// command-line overrides.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
    env: Option<EnvConfig>,
    overrides: ConfigOverrides,
}

impl ConfigLoader {
    /// Loader with the default search paths and `.env` handling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this configuration file; it must exist.
    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    /// Read this `.env` file.
    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Skip `.env` files entirely.
    pub fn without_env_file(mut self) -> Self {
        self.options.load_env_file = false;
        self
    }

    /// Replace the default configuration file locations.
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.options.search_paths = paths;
        self
    }

    /// Use `env` instead of reading the process environment.
    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.env = Some(env);
        self
    }

    /// Apply command-line values on top of everything else.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Merge every source, validate the result and collect warnings.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = if self.options.load_env_file {
            self.load_env_file()?
        } else {
            false
        };

        let env_config = match &self.env {
            Some(env) => env.clone(),
            None => EnvConfig::gather(),
        };

        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let (config, warnings) =
            self.compose_config(file_config, env_config, config_path, env_file_loaded)?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path),
            None => dotenvy::dotenv().map(|_| ()),
        };
        match loaded {
            Ok(()) => Ok(true),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env_config.config_path {
            source.env = Some(from_env.clone());
        } else {
            source.default = self
                .options
                .search_paths
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;

        debug!(
            target: "gzship::config",
            path = %path.display(),
            ?provenance,
            "loaded configuration file"
        );
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
        env_file_loaded: bool,
    ) -> Result<(GzshipConfig, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if file_config.is_none() {
            warnings.push_with_hint(
                "No gzship.toml detected; using environment variables and defaults",
                "Pass --config or set GZSHIP_CONFIG to use a configuration file",
            );
        }
        for (key, value) in &env.unparsed {
            warnings.push(format!("ignoring {key}={value:?}: not a whole number"));
        }

        let FileConfig {
            upload: file_upload,
            monitor: file_monitor,
            scan: file_scan,
            workers: file_workers,
        } = file_config.unwrap_or_default();
        let overrides = &self.overrides;

        let address = overrides
            .upload_address
            .clone()
            .or(env.upload_address)
            .or(file_upload.address)
            .unwrap_or_else(|| DEFAULT_UPLOAD_ADDRESS.to_string());
        let base_url = resolve_upload_url(&address).map_err(|reason| {
            ConfigGuardRailError::InvalidUploadAddress {
                address: address.clone(),
                reason,
            }
        })?;
        let upload = UploadConfig {
            address,
            base_url,
            request_timeout: file_upload
                .request_timeout
                .as_deref()
                .map(|raw| duration_field("upload.request_timeout", raw))
                .transpose()?,
        };

        let listen = overrides
            .monitor_listen_address
            .clone()
            .or(env.monitor_listen_address)
            .or(file_monitor.listen_address)
            .unwrap_or_else(|| DEFAULT_MONITOR_LISTEN_ADDRESS.to_string());
        let monitor = MonitorConfig {
            listen_address: resolve_listen_address(&listen).map_err(|reason| {
                ConfigGuardRailError::InvalidListenAddress {
                    address: listen.clone(),
                    reason,
                }
            })?,
        };

        let interval = match overrides.scan_interval {
            Some(interval) => interval,
            None => match (env.scan_interval, file_scan.interval) {
                (Some(raw), _) => duration_field("GZSHIP_SCAN_INTERVAL_SECS", &raw)?,
                (None, Some(raw)) => duration_field("scan.interval", &raw)?,
                (None, None) => DEFAULT_SCAN_INTERVAL,
            },
        };
        let scan = ScanConfig {
            watch_dir: overrides
                .watch_dir
                .clone()
                .or(env.watch_dir)
                .or(file_scan.watch_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            pattern: overrides
                .pattern
                .clone()
                .or(env.pattern)
                .or(file_scan.pattern)
                .unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
            interval,
            max_in_flight: env.max_in_flight.or(file_scan.max_in_flight),
        };

        let shutdown_grace = match (env.shutdown_grace, file_workers.shutdown_grace) {
            (Some(raw), _) => duration_field("GZSHIP_SHUTDOWN_GRACE_SECS", &raw)?,
            (None, Some(raw)) => duration_field("workers.shutdown_grace", &raw)?,
            (None, None) => DEFAULT_SHUTDOWN_GRACE,
        };
        let workers = WorkerConfig {
            count: overrides
                .workers
                .or(env.workers)
                .or(file_workers.count)
                .unwrap_or(DEFAULT_WORKERS),
            queue_capacity: env
                .queue_capacity
                .or(file_workers.queue_capacity)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            shutdown_grace,
        };

        let config = GzshipConfig {
            upload,
            monitor,
            scan,
            workers,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        };

        let guard_warnings = validation::apply_guard_rails(&config)?;
        warnings.extend(guard_warnings);

        Ok((config, warnings))
    }
}

fn duration_field(field: &'static str, raw: &str) -> Result<Duration, ConfigLoadError> {
    parse_duration(raw).map_err(|source| ConfigLoadError::InvalidDuration {
        field,
        value: raw.to_string(),
        source,
    })
}

/// Reasons configuration loading can fail.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// An explicitly named configuration file does not exist.
    #[error("configuration file missing: {}", path.display())]
    MissingConfig {
        /// Path that was requested.
        path: PathBuf,
    },
    /// The configuration file could not be read.
    #[error("failed to read configuration {}", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse configuration {}", path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
    /// A duration value could not be parsed.
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        /// Setting the value was given for.
        field: &'static str,
        /// Raw value.
        value: String,
        /// Underlying error.
        #[source]
        source: humantime::DurationError,
    },
    /// The merged values are unusable.
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    /// A `.env` file exists but could not be read.
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(self, ConfigPathProvenance::Explicit | ConfigPathProvenance::Env)
    }
}

/// A loaded configuration and the warnings raised while checking it.
#[derive(Debug)]
pub struct ConfigLoad {
    /// Resolved configuration.
    pub config: GzshipConfig,
    /// Questionable but usable settings.
    pub warnings: ConfigWarnings,
}

impl ConfigLoad {
    /// Path of the configuration file that was read, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.config.metadata.config_path.as_deref()
    }
}
