//! Storage seam for uploads.
//!
//! A [`ChunkSink`] is a single-key cursor: `open` a key, `write` chunks in
//! order, `close` to commit. A [`SinkFactory`] is the shared backend that
//! hands every session its own sink, so two uploads never share a cursor.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    #[error("no object is open for writing")]
    NotOpen,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Write side of one stored object at a time, plus reads of committed objects.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Start a new object under `key`. Anything still open is committed first.
    async fn open(&mut self, key: &str) -> StorageResult<()>;

    /// Append `data` to the open object, returning the number of bytes taken.
    async fn write(&mut self, data: &[u8]) -> StorageResult<usize>;

    /// Commit the open object. A no-op when nothing is open.
    async fn close(&mut self) -> StorageResult<()>;

    /// Drop the open object without making it visible. A no-op when nothing is open.
    async fn discard(&mut self) -> StorageResult<()>;

    /// Read back a committed object.
    async fn load(&self, key: &str) -> StorageResult<Bytes>;
}

/// Backend shared across sessions.
#[async_trait]
pub trait SinkFactory: Send + Sync {
    /// A fresh sink with its own cursor over this backend.
    fn sink(&self) -> Box<dyn ChunkSink>;

    /// Read a committed object without opening a session.
    async fn load(&self, key: &str) -> StorageResult<Bytes>;

    /// Static name used in logs and readiness output.
    fn backend_name(&self) -> &'static str;
}

/// Reject keys that could escape a storage root or confuse a filesystem.
///
/// Keys are flat: one path component, no `..`, no separators, no control bytes.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".into()));
    }
    if key == "." || key == ".." || key.contains("..") {
        return Err(StorageError::InvalidKey(format!(
            "path traversal not allowed: {key}"
        )));
    }
    if key
        .chars()
        .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control())
    {
        return Err(StorageError::InvalidKey(format!(
            "contains unsafe characters: {key:?}"
        )));
    }
    Ok(())
}
