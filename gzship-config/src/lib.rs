//! Configuration loading for gzship.
//!
//! Values are layered from built-in defaults, an optional TOML file, the
//! process environment (after an optional `.env` file), and command-line
//! overrides, in increasing order of precedence.

/// Layered configuration loading.
pub mod loader;
/// Resolved configuration types.
pub mod models;
/// Raw values from files, the environment and the command line.
pub mod sources;
/// Parsing helpers for durations and addresses.
pub mod util;
/// Guard rails and configuration warnings.
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    ConfigMetadata, GzshipConfig, MonitorConfig, ScanConfig, UploadConfig, WorkerConfig,
};
pub use sources::{ConfigOverrides, EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
