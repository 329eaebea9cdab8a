//! Process-level series (`process_*`) appended to the Prometheus exposition,
//! sampled fresh on every scrape.

use std::fmt::{Display, Write};
use std::time::{Duration, Instant};

use sysinfo::{Process, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing::debug;

/// Resource usage of the current process at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessSnapshot {
    /// Resident set size in bytes.
    pub resident_memory_bytes: u64,
    /// Virtual memory size in bytes.
    pub virtual_memory_bytes: u64,
    /// User plus system CPU time consumed so far.
    pub cpu_seconds_total: f64,
    /// Process start time as seconds since the Unix epoch.
    pub start_time_seconds: u64,
}

impl ProcessSnapshot {
    /// Read the current process from the OS. Blocking.
    pub fn capture() -> Option<Self> {
        let pid = sysinfo::get_current_pid().ok()?;

        let mut system = System::new_with_specifics(RefreshKind::nothing());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );

        system.process(pid).map(Self::from_process)
    }

    fn from_process(process: &Process) -> Self {
        Self {
            resident_memory_bytes: process.memory(),
            virtual_memory_bytes: process.virtual_memory(),
            cpu_seconds_total: process.accumulated_cpu_time() as f64 / 1000.0,
            start_time_seconds: process.start_time(),
        }
    }

    /// Append the snapshot in Prometheus text format.
    pub fn render_into(&self, out: &mut String) {
        series(
            out,
            "process_cpu_seconds_total",
            "Total user and system CPU time spent in seconds.",
            "counter",
            self.cpu_seconds_total,
        );
        series(
            out,
            "process_resident_memory_bytes",
            "Resident memory size in bytes.",
            "gauge",
            self.resident_memory_bytes,
        );
        series(
            out,
            "process_virtual_memory_bytes",
            "Virtual memory size in bytes.",
            "gauge",
            self.virtual_memory_bytes,
        );
        series(
            out,
            "process_start_time_seconds",
            "Start time of the process since unix epoch in seconds.",
            "gauge",
            self.start_time_seconds,
        );
    }
}

/// Capture a snapshot off the async workers.
pub async fn sample() -> Option<ProcessSnapshot> {
    let start = Instant::now();
    let snapshot = match tokio::task::spawn_blocking(ProcessSnapshot::capture).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            debug!(target: "gzship::monitor", error = %err, "process sample task failed");
            None
        }
    };

    let elapsed = start.elapsed();
    if elapsed > Duration::from_millis(25) {
        debug!(
            target: "gzship::monitor",
            elapsed_ms = elapsed.as_millis() as u64,
            "process sample was slow"
        );
    }
    snapshot
}

fn series(out: &mut String, name: &str, help: &str, kind: &str, value: impl Display) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    // Writing into a String cannot fail.
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    let _ = writeln!(out, "{name} {value}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_prometheus_text() {
        let snapshot = ProcessSnapshot {
            resident_memory_bytes: 4096,
            virtual_memory_bytes: 8192,
            cpu_seconds_total: 1.5,
            start_time_seconds: 1_700_000_000,
        };
        let mut out = String::from("gzship_in_flight 0");
        snapshot.render_into(&mut out);

        assert!(out.starts_with("gzship_in_flight 0\n# HELP process_cpu_seconds_total"));
        assert!(out.contains("# TYPE process_cpu_seconds_total counter\n"));
        assert!(out.contains("process_cpu_seconds_total 1.5\n"));
        assert!(out.contains("process_resident_memory_bytes 4096\n"));
        assert!(out.contains("process_virtual_memory_bytes 8192\n"));
        assert!(out.contains("process_start_time_seconds 1700000000\n"));
    }

    #[test]
    fn captures_the_current_process() {
        let snapshot = ProcessSnapshot::capture().unwrap();
        assert!(snapshot.resident_memory_bytes > 0);
        assert!(snapshot.start_time_seconds > 0);
    }
}
