//! One upload, start to finish.
//!
//! `IngestionSession` consumes a stream of [`UploadRequest`] messages and
//! moves through `AwaitingFirstMessage -> Receiving -> Finalizing -> Done`,
//! or to `Failed` from any of them. The first message carries the file name
//! and content type; every message (the first included) may carry bytes,
//! which are written to the session's own [`ChunkSink`] in receipt order.
//! Uploads declared as `application/json` get a second, transformed copy
//! stored under `modified_<key>`.

use crate::{
    models::upload::{StorageKey, UploadRequest, UploadResponse},
    services::{
        chunk_sink::{ChunkSink, StorageError},
        json_transform::{self, TransformError},
        key_generator,
    },
};
use futures::{Stream, StreamExt, pin_mut};
use std::{io, net::IpAddr};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default cap on a single upload (64 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 64 * 1024 * 1024;
pub const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("failed to receive chunk: {0}")]
    Transport(#[source] io::Error),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("failed to process uploaded JSON data: {0}")]
    InvalidInput(#[from] TransformError),
    #[error("could not determine the caller's network address")]
    Identity,
    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
}

/// How an error is reported to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidArgument,
    Internal,
}

impl IngestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestError::Protocol(_) | IngestError::TooLarge { .. } => {
                ErrorCategory::InvalidArgument
            }
            IngestError::Transport(_)
            | IngestError::Storage(_)
            | IngestError::InvalidInput(_)
            | IngestError::Identity => ErrorCategory::Internal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingFirstMessage,
    Receiving,
    Finalizing,
    Done,
    Failed,
}

#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    pub max_upload_bytes: u64,
}

impl SessionOptions {
    /// Limits above `u32::MAX` are clamped; the response reports size as `u32`.
    pub fn new(max_upload_bytes: u64) -> Self {
        Self {
            max_upload_bytes: max_upload_bytes.min(u64::from(u32::MAX)),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

/// Result of a completed session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub response: UploadResponse,
    /// MD5 hex digest of the original bytes.
    pub etag: String,
    /// Set when a transformed JSON copy was stored.
    pub modified_key: Option<StorageKey>,
}

/// Metadata pulled from the first message.
struct Handshake {
    key: StorageKey,
    mime_type: Option<String>,
    first: UploadRequest,
}

pub struct IngestionSession {
    sink: Box<dyn ChunkSink>,
    base_key: StorageKey,
    options: SessionOptions,
    state: SessionState,
}

impl IngestionSession {
    /// Session writing through `sink` under keys derived from `base_key`.
    pub fn new(sink: Box<dyn ChunkSink>, base_key: StorageKey, options: SessionOptions) -> Self {
        Self {
            sink,
            base_key,
            options,
            state: SessionState::AwaitingFirstMessage,
        }
    }

    /// Session keyed by the caller's address. Fails before any storage is
    /// touched when the address is unknown.
    pub fn for_peer(
        sink: Box<dyn ChunkSink>,
        peer: Option<IpAddr>,
        options: SessionOptions,
    ) -> Result<Self, IngestError> {
        let ip = peer.ok_or(IngestError::Identity)?;
        Ok(Self::new(sink, key_generator::generate(ip), options))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Consume `stream` to completion and commit the upload.
    pub async fn run<S>(&mut self, stream: S) -> Result<UploadOutcome, IngestError>
    where
        S: Stream<Item = io::Result<UploadRequest>> + Send,
    {
        if self.state != SessionState::AwaitingFirstMessage {
            return Err(IngestError::Protocol(format!(
                "session already used (state {:?})",
                self.state
            )));
        }

        pin_mut!(stream);
        match self.drive(&mut stream).await {
            Ok(outcome) => {
                self.state = SessionState::Done;
                info!(
                    "stored {} ({} bytes, etag {})",
                    outcome.response.file_name, outcome.response.size, outcome.etag
                );
                Ok(outcome)
            }
            Err(err) => {
                self.state = SessionState::Failed;
                warn!("upload {} failed: {}", self.base_key, err);
                Err(err)
            }
        }
    }

    async fn drive<S>(&mut self, stream: &mut S) -> Result<UploadOutcome, IngestError>
    where
        S: Stream<Item = io::Result<UploadRequest>> + Unpin,
    {
        let handshake = self.await_first_message(stream).await?;

        self.state = SessionState::Receiving;
        let (size, etag) = match self.receive(handshake.first, stream).await {
            Ok(received) => received,
            Err(err) => {
                self.release().await;
                return Err(err);
            }
        };

        self.state = SessionState::Finalizing;
        self.sink.close().await?;
        debug!("closed {}", handshake.key);

        let modified_key = if is_json(handshake.mime_type.as_deref()) {
            Some(self.store_transformed(&handshake.key).await?)
        } else {
            None
        };

        let size = u32::try_from(size).map_err(|_| IngestError::TooLarge {
            limit: self.options.max_upload_bytes,
        })?;
        Ok(UploadOutcome {
            response: UploadResponse {
                file_name: handshake.key.into_string(),
                size,
            },
            etag,
            modified_key,
        })
    }

    /// Read the opening message and open the sink under the composed key.
    async fn await_first_message<S>(&mut self, stream: &mut S) -> Result<Handshake, IngestError>
    where
        S: Stream<Item = io::Result<UploadRequest>> + Unpin,
    {
        let first = match stream.next().await {
            Some(message) => message.map_err(IngestError::Transport)?,
            None => {
                return Err(IngestError::Protocol(
                    "stream ended before the first message".into(),
                ));
            }
        };

        let mime_type = first.mime_type.clone();
        info!("Content-Type: {}", mime_type.as_deref().unwrap_or("<none>"));

        let key = key_generator::compose(&self.base_key, first.file_name.as_deref());
        self.sink.open(key.as_str()).await?;
        debug!("opened {}", key);

        Ok(Handshake {
            key,
            mime_type,
            first,
        })
    }

    /// Write the first message's bytes and everything after it, returning
    /// the byte count and MD5 digest.
    async fn receive<S>(
        &mut self,
        first: UploadRequest,
        stream: &mut S,
    ) -> Result<(u64, String), IngestError>
    where
        S: Stream<Item = io::Result<UploadRequest>> + Unpin,
    {
        let mut size = 0u64;
        let mut digest = md5::Context::new();

        self.write_chunk(&first, &mut size, &mut digest).await?;
        while let Some(message) = stream.next().await {
            let message = message.map_err(IngestError::Transport)?;
            self.write_chunk(&message, &mut size, &mut digest).await?;
        }

        Ok((size, format!("{:x}", digest.compute())))
    }

    async fn write_chunk(
        &mut self,
        message: &UploadRequest,
        size: &mut u64,
        digest: &mut md5::Context,
    ) -> Result<(), IngestError> {
        let chunk = &message.chunk;
        if chunk.is_empty() {
            return Ok(());
        }

        let limit = self.options.max_upload_bytes;
        let total = size.saturating_add(chunk.len() as u64);
        if total > limit {
            return Err(IngestError::TooLarge { limit });
        }

        self.sink.write(chunk).await?;
        digest.consume(chunk);
        *size = total;
        debug!("wrote {} bytes ({} total)", chunk.len(), total);
        Ok(())
    }

    /// Load the committed original, transform it, and store the result.
    ///
    /// The transform runs fully in memory before the modified key is opened;
    /// a failed write is discarded so no partial copy becomes visible.
    async fn store_transformed(&mut self, key: &StorageKey) -> Result<StorageKey, IngestError> {
        let original = self.sink.load(key.as_str()).await?;
        let transformed = json_transform::transform(&original)?;

        let modified = key_generator::modified_key(key);
        self.sink.open(modified.as_str()).await?;
        if let Err(err) = self.sink.write(&transformed).await {
            if let Err(cleanup) = self.sink.discard().await {
                warn!("failed to discard partial {}: {}", modified, cleanup);
            }
            return Err(err.into());
        }
        self.sink.close().await?;

        debug!("stored transformed copy {} ({} bytes)", modified, transformed.len());
        Ok(modified)
    }

    /// Close the sink on a failure path. Errors here are logged, never raised.
    async fn release(&mut self) {
        if let Err(err) = self.sink.close().await {
            warn!("failed to close sink for {}: {}", self.base_key, err);
        }
    }
}

/// Media type without parameters, compared case-insensitively.
pub fn is_json(mime_type: Option<&str>) -> bool {
    mime_type
        .and_then(|value| value.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(JSON_MIME_TYPE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_detection_ignores_parameters_and_case() {
        assert!(is_json(Some("application/json")));
        assert!(is_json(Some("Application/JSON; charset=utf-8")));
        assert!(!is_json(Some("text/plain")));
        assert!(!is_json(Some("application/jsonx")));
        assert!(!is_json(None));
    }

    #[test]
    fn error_categories() {
        assert_eq!(
            IngestError::Protocol("x".into()).category(),
            ErrorCategory::InvalidArgument
        );
        assert_eq!(
            IngestError::TooLarge { limit: 1 }.category(),
            ErrorCategory::InvalidArgument
        );
        assert_eq!(IngestError::Identity.category(), ErrorCategory::Internal);
        assert_eq!(
            IngestError::Storage(StorageError::NotOpen).category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn options_clamp_to_response_width() {
        assert_eq!(
            SessionOptions::new(u64::MAX).max_upload_bytes,
            u64::from(u32::MAX)
        );
    }
}
