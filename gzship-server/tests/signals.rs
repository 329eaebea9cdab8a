#![cfg(unix)]

use std::time::Duration;

use gzship_server::signals;
use nix::sys::signal::{Signal, raise};

#[tokio::test]
async fn sigterm_resolves_shutdown_signal() {
    let waiter = tokio::spawn(signals::shutdown_signal());

    // Let the spawned future install its handlers before the signal is sent;
    // an unhandled SIGTERM would end the test process.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!waiter.is_finished());

    raise(Signal::SIGTERM).unwrap();
    tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("shutdown signal did not resolve")
        .unwrap();
}
