//! Pipeline counters published through the `metrics` facade.
//!
//! Recording is a no-op until a recorder is installed by the host process.

use metrics::{Unit, counter, describe_counter, describe_gauge, gauge};

use crate::task::UploadOutcome;

/// Counter of directory scans.
pub const SCANS_TOTAL: &str = "gzship_scans_total";
/// Counter of failed directory listings.
pub const SCAN_FAILURES_TOTAL: &str = "gzship_scan_failures_total";
/// Counter of queued files.
pub const FILES_ENQUEUED_TOTAL: &str = "gzship_files_enqueued_total";
/// Counter of upload attempts, labelled by `outcome`.
pub const UPLOADS_TOTAL: &str = "gzship_uploads_total";
/// Counter of bytes accepted by the collector.
pub const UPLOAD_BYTES_TOTAL: &str = "gzship_upload_bytes_total";
/// Counter of uploaded files that could not be deleted.
pub const DELETE_FAILURES_TOTAL: &str = "gzship_delete_failures_total";
/// Gauge of files currently in flight.
pub const IN_FLIGHT: &str = "gzship_in_flight";

/// Register help text for every pipeline metric.
pub fn describe() {
    describe_counter!(SCANS_TOTAL, "Directory scans performed");
    describe_counter!(SCAN_FAILURES_TOTAL, "Directory scans skipped because listing failed");
    describe_counter!(FILES_ENQUEUED_TOTAL, "Files pushed onto the task queue");
    describe_counter!(UPLOADS_TOTAL, "Upload attempts by outcome");
    describe_counter!(UPLOAD_BYTES_TOTAL, Unit::Bytes, "Bytes accepted by the collector");
    describe_counter!(
        DELETE_FAILURES_TOTAL,
        "Uploaded files whose local copy could not be removed"
    );
    describe_gauge!(IN_FLIGHT, "Files currently tracked as in flight");
}

pub(crate) fn record_scan(succeeded: bool) {
    counter!(SCANS_TOTAL).increment(1);
    if !succeeded {
        counter!(SCAN_FAILURES_TOTAL).increment(1);
    }
}

pub(crate) fn record_enqueued() {
    counter!(FILES_ENQUEUED_TOTAL).increment(1);
}

pub(crate) fn record_in_flight(len: usize) {
    gauge!(IN_FLIGHT).set(len as f64);
}

pub(crate) fn record_outcome(outcome: &UploadOutcome) {
    counter!(UPLOADS_TOTAL, "outcome" => outcome.label()).increment(1);
    if let UploadOutcome::Uploaded { bytes, removed } = outcome {
        counter!(UPLOAD_BYTES_TOTAL).increment(*bytes);
        if !removed {
            counter!(DELETE_FAILURES_TOTAL).increment(1);
        }
    }
}
