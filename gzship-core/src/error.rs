use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or running the pipeline.
#[derive(Error, Debug)]
pub enum ShipError {
    /// The configured glob does not parse.
    #[error("Invalid file pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    /// The collector URL cannot carry a file name.
    #[error("Invalid upload URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Listing the watched directory failed; the scan was skipped.
    #[error("Directory listing failed for {}: {reason}", path.display())]
    Scan {
        /// Directory that was being listed.
        path: PathBuf,
        /// Underlying I/O error text.
        reason: String,
    },

    /// A pipeline queue was closed by its other end.
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    /// Shutdown interrupted the operation.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Settings rejected by [`PipelineConfig::validate`](crate::PipelineConfig::validate).
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ShipError>;
