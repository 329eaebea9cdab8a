use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use gzship_config::{ConfigLoader, EnvConfig};
use gzship_server::logging;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn default_filter_parses() {
    assert!(EnvFilter::try_new(logging::DEFAULT_FILTER).is_ok());
}

#[test]
fn configuration_loading_is_logged_once_a_subscriber_exists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gzship.toml");
    std::fs::write(&path, "[workers]\ncount = 2\n").unwrap();

    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("gzship=debug"))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let load = tracing::subscriber::with_default(subscriber, || {
        ConfigLoader::new()
            .without_env_file()
            .with_env(EnvConfig::default())
            .with_config_path(path.clone())
            .load()
            .unwrap()
    });

    assert_eq!(load.config.workers.count, 2);
    let text = captured.text();
    assert!(text.contains("loaded configuration file"), "{text}");
    assert!(text.contains("gzship::config"), "{text}");
}
