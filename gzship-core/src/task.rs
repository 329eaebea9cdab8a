//! Units of work flowing through the pipeline and the outcome workers report
//! back for each of them.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// One compressed data file eligible for upload, identified by its file name
/// relative to the watched directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileTask {
    name: String,
}

impl FileTask {
    /// Task for the file called `name` in the watched directory.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// File name relative to the watched directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location of the file on disk when the watched directory is `dir`.
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
    }
}

impl fmt::Display for FileTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Why an upload attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The local file could not be opened.
    Open {
        /// Error kind reported by the OS.
        kind: io::ErrorKind,
        /// Full error text.
        message: String,
    },
    /// The request could not be built, so nothing was sent.
    Request(String),
    /// Connection, TLS, or body streaming failure.
    Transport(String),
    /// The collector answered with something other than `200 OK`.
    Status(u16),
}

impl FailureReason {
    /// Capture an error from opening the local file.
    pub fn open(err: &io::Error) -> Self {
        Self::Open {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Whether a later attempt on the same file can reasonably succeed.
    ///
    /// A vanished file or a malformed request will fail the same way again;
    /// client errors other than timeouts and throttling are treated alike.
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureReason::Open { kind, .. } => *kind != io::ErrorKind::NotFound,
            FailureReason::Request(_) => false,
            FailureReason::Transport(_) => true,
            FailureReason::Status(code) => {
                !(400..500).contains(code) || *code == 408 || *code == 429
            }
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Open { message, .. } => write!(f, "open failed: {message}"),
            FailureReason::Request(message) => write!(f, "request not built: {message}"),
            FailureReason::Transport(message) => write!(f, "transport error: {message}"),
            FailureReason::Status(code) => write!(f, "collector returned status {code}"),
        }
    }
}

/// Result of processing one [`FileTask`], reported to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The collector accepted the file. `removed` is false when the local
    /// copy could not be deleted afterwards.
    Uploaded {
        /// Size of the file when it was opened.
        bytes: u64,
        /// Whether the local copy was deleted.
        removed: bool,
    },
    /// The upload failed but may succeed on a later scan.
    RetryableFailure(FailureReason),
    /// The upload failed in a way a retry would repeat.
    PermanentFailure(FailureReason),
}

impl UploadOutcome {
    /// Classify a failure as retryable or permanent.
    pub fn failed(reason: FailureReason) -> Self {
        if reason.is_retryable() {
            UploadOutcome::RetryableFailure(reason)
        } else {
            UploadOutcome::PermanentFailure(reason)
        }
    }

    /// True when the collector accepted the file.
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded { .. })
    }

    /// Stable label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            UploadOutcome::Uploaded { .. } => "uploaded",
            UploadOutcome::RetryableFailure(_) => "retryable_failure",
            UploadOutcome::PermanentFailure(_) => "permanent_failure",
        }
    }
}

/// Completion notice sent from a worker back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The file that was processed.
    pub task: FileTask,
    /// What happened to it.
    pub outcome: UploadOutcome,
}
