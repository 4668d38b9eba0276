//! Shared helpers for ingestion and HTTP tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use uploader::{
    models::upload::{StorageKey, UploadRequest},
    services::chunk_sink::{ChunkSink, StorageError, StorageResult},
};

pub fn base_key() -> StorageKey {
    StorageKey::new("127.0.0.1_0badf00d_20240501-120000")
}

/// Opening message followed by one data-only message per chunk.
pub fn messages(
    file_name: Option<&str>,
    mime_type: Option<&str>,
    chunks: &[&[u8]],
) -> Vec<io::Result<UploadRequest>> {
    let mut out = vec![Ok(UploadRequest::first(
        file_name.map(str::to_string),
        mime_type.map(str::to_string),
        Bytes::new(),
    ))];
    out.extend(
        chunks
            .iter()
            .map(|chunk| Ok(UploadRequest::chunk(Bytes::copy_from_slice(chunk)))),
    );
    out
}

/// Call counters shared between a test and its [`CountingSink`].
#[derive(Clone, Default)]
pub struct SinkCalls {
    pub opens: Arc<AtomicUsize>,
    pub writes: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub discards: Arc<AtomicUsize>,
}

impl SinkCalls {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn discards(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }
}

/// Wraps another sink, counting calls and optionally failing writes.
pub struct CountingSink {
    inner: Box<dyn ChunkSink>,
    calls: SinkCalls,
    /// Fail the write with this 1-based index.
    fail_write_at: Option<usize>,
}

impl CountingSink {
    pub fn new(inner: Box<dyn ChunkSink>) -> (Self, SinkCalls) {
        let calls = SinkCalls::default();
        (
            Self {
                inner,
                calls: calls.clone(),
                fail_write_at: None,
            },
            calls,
        )
    }

    pub fn failing_write(inner: Box<dyn ChunkSink>, nth: usize) -> (Self, SinkCalls) {
        let (mut sink, calls) = Self::new(inner);
        sink.fail_write_at = Some(nth);
        (sink, calls)
    }
}

#[async_trait]
impl ChunkSink for CountingSink {
    async fn open(&mut self, key: &str) -> StorageResult<()> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(key).await
    }

    async fn write(&mut self, data: &[u8]) -> StorageResult<usize> {
        let nth = self.calls.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_write_at == Some(nth) {
            return Err(StorageError::Io(io::Error::other("disk full")));
        }
        self.inner.write(data).await
    }

    async fn close(&mut self) -> StorageResult<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }

    async fn discard(&mut self) -> StorageResult<()> {
        self.calls.discards.fetch_add(1, Ordering::SeqCst);
        self.inner.discard().await
    }

    async fn load(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.load(key).await
    }
}
