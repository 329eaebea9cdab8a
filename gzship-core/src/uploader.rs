use std::fmt;

use async_trait::async_trait;
use reqwest::{Body, StatusCode};
use tokio_util::io::ReaderStream;
use tracing::trace;
use url::Url;

use crate::config::PipelineConfig;
use crate::error::{Result, ShipError};
use crate::fs::OpenedFile;
use crate::task::{FailureReason, FileTask};

/// Transfers one file's bytes to the remote collector.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Send `file` for `task`. `Ok` only when the collector confirmed receipt.
    async fn put(
        &self,
        task: &FileTask,
        file: OpenedFile,
    ) -> std::result::Result<(), FailureReason>;
}

/// Uploads files with an HTTP `PUT` to `<base>/<file name>`.
///
/// Only `200 OK` counts as success. No authentication, content type, or retry
/// is applied.
#[derive(Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    base_url: Url,
}

impl fmt::Debug for HttpUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpUploader")
            .field("base_url", &self.base_url.as_str())
            .field("http_client", &self.client)
            .finish()
    }
}

impl HttpUploader {
    /// Build a client from `config`, applying its request timeout.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Self::with_client(builder.build()?, config.upload_base_url.clone())
    }

    /// Use an existing client. Rejects base URLs that cannot take a path.
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ShipError::InvalidUrl(format!("{base_url} cannot carry a file path")));
        }
        Ok(Self { client, base_url })
    }

    /// Destination for a task. The file name becomes a single, percent-encoded
    /// path segment.
    pub fn target_url(&self, task: &FileTask) -> std::result::Result<Url, FailureReason> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FailureReason::Request(format!("{} cannot carry a file path", self.base_url))
            })?
            .pop_if_empty()
            .push(task.name());
        Ok(url)
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn put(
        &self,
        task: &FileTask,
        file: OpenedFile,
    ) -> std::result::Result<(), FailureReason> {
        let url = self.target_url(task)?;
        trace!(target: "gzship::worker", file = %task, url = %url, bytes = file.len, "sending PUT");

        let body = Body::wrap_stream(ReaderStream::new(file.reader));
        let response = self
            .client
            .put(url)
            .body(body)
            .send()
            .await
            .map_err(|err| FailureReason::Transport(err.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(FailureReason::Status(status.as_u16())),
        }
    }
}
