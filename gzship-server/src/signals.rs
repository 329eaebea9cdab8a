use tracing::{info, warn};

/// Resolve on the first SIGINT (Ctrl+C) or, on unix, SIGTERM.
///
/// If a handler cannot be installed that signal is ignored and a warning is
/// logged; the other one still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!(target: "gzship::supervisor", "received SIGINT"),
            Err(err) => {
                warn!(target: "gzship::supervisor", error = %err, "cannot listen for SIGINT");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!(target: "gzship::supervisor", "received SIGTERM");
            }
            Err(err) => {
                warn!(target: "gzship::supervisor", error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
