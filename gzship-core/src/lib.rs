//! Scan, queue, upload and acknowledge pipeline for shipping compressed data
//! files to a collector.
//!
//! A [`Coordinator`] periodically lists a directory for files matching a glob
//! (`*.gz` by default) and queues each one at most once. [`UploadWorker`]s
//! `PUT` the file to `<base>/<file name>`, delete it after a `200 OK` and always
//! report a [`Completion`] back so the file can be picked up again if it is
//! still on disk. [`PipelineSupervisor`] owns the loops and stops them on
//! request.

/// Pipeline settings and their defaults.
pub mod config;
/// Directory scanning and in-flight bookkeeping.
pub mod coordinator;
/// Crate error type.
pub mod error;
/// Filesystem access used by the scanner and workers.
pub mod fs;
/// Task and completion queues.
pub mod queue;
/// Startup and shutdown of the pipeline loops.
pub mod supervisor;
/// Work items and upload outcomes.
pub mod task;
/// Pipeline metrics.
pub mod telemetry;
/// Transport to the collector.
pub mod uploader;
/// Upload workers.
pub mod worker;

pub use config::PipelineConfig;
pub use coordinator::{Coordinator, ScanReport};
pub use error::{Result, ShipError};
pub use fs::{DirEntry, FileSystem, InMemoryFs, OpenedFile, RealFs};
pub use queue::{PipelineChannels, TaskReceiver};
pub use supervisor::{PipelineSupervisor, ShutdownReport};
pub use task::{Completion, FailureReason, FileTask, UploadOutcome};
pub use uploader::{HttpUploader, Uploader};
pub use worker::UploadWorker;
