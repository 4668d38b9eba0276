//! HTTP client that streams a local file to `POST /upload`.

use crate::{
    handlers::upload_handlers::{FILE_NAME_HEADER, MODIFIED_KEY_HEADER},
    models::upload::UploadResponse,
    services::ingestion::JSON_MIME_TYPE,
};
use anyhow::{Context, Result, bail};
use futures::StreamExt;
use reqwest::{Url, header};
use std::path::Path;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Bytes per chunk unless the caller asks otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 128;
const OCTET_STREAM: &str = "application/octet-stream";

/// What the server reported for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub response: UploadResponse,
    /// Key of the transformed JSON copy, when the server stored one.
    pub modified_key: Option<String>,
}

/// How a file is cut up on the wire.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Upper bound on bytes per body frame.
    pub chunk_size: usize,
    /// Overrides the type guessed from the file extension.
    pub content_type: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            content_type: None,
        }
    }
}

#[derive(Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    base_url: Url,
}

impl UploadClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    /// Stream `path` to the server in `options.chunk_size` pieces.
    pub async fn upload_file(
        &self,
        path: &Path,
        options: &UploadOptions,
    ) -> Result<UploadReceipt> {
        if options.chunk_size == 0 {
            bail!("chunk size must be greater than zero");
        }
        let url = self
            .base_url
            .join("/upload")
            .context("failed to build upload URL")?;
        let file = File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;

        let content_type = options
            .content_type
            .clone()
            .unwrap_or_else(|| guess_content_type(path).to_string());
        let chunks = ReaderStream::with_capacity(file, options.chunk_size).inspect(|chunk| {
            if let Ok(bytes) = chunk {
                debug!("sending {} bytes", bytes.len());
            }
        });

        let mut request = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(reqwest::Body::wrap_stream(chunks));
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            request = request.header(FILE_NAME_HEADER, name);
        }

        let response = request.send().await?;
        let status = response.status();
        let modified_key = response
            .headers()
            .get(MODIFIED_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("upload failed ({}): {}", status, body);
        }

        Ok(UploadReceipt {
            response: serde_json::from_str(&body).context("unexpected upload response")?,
            modified_key,
        })
    }
}

/// `application/json` for `.json` files, opaque bytes otherwise.
pub fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => JSON_MIME_TYPE,
        _ => OCTET_STREAM,
    }
}
