//! Messages exchanged over one client-streaming upload.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One message of the inbound stream.
///
/// Only the first message of a stream is expected to carry `file_name` and
/// `mime_type`; later messages carry only `chunk`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadRequest {
    /// Raw payload bytes. May be empty.
    pub chunk: Bytes,

    /// Client-side name of the file, used as a key suffix.
    pub file_name: Option<String>,

    /// Declared content type. Only gates JSON post-processing.
    pub mime_type: Option<String>,
}

impl UploadRequest {
    /// A data-only message.
    pub fn chunk(data: impl Into<Bytes>) -> Self {
        Self {
            chunk: data.into(),
            ..Self::default()
        }
    }

    /// An opening message carrying metadata and, optionally, the first bytes.
    pub fn first(
        file_name: Option<String>,
        mime_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            chunk: data.into(),
            file_name,
            mime_type,
        }
    }
}

/// Returned exactly once per completed upload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadResponse {
    /// Storage key the original upload was committed under.
    pub file_name: String,

    /// Total payload bytes received.
    pub size: u32,
}

/// Identifier of one stored object, generated once per session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
