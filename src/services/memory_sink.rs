//! Volatile backend: a shared key -> bytes map.
//!
//! Used for tests and for running the service without touching disk.
//! Each sink buffers the open object privately and only publishes it to
//! the shared map on `close`.

use crate::services::chunk_sink::{
    ChunkSink, SinkFactory, StorageError, StorageResult, validate_key,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::debug;

type ObjectMap = Arc<Mutex<HashMap<String, Bytes>>>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: ObjectMap,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted list of committed keys.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }

    /// Concrete sink, for callers that want to inspect it directly.
    pub fn memory_sink(&self) -> MemorySink {
        MemorySink {
            objects: self.objects.clone(),
            current: None,
        }
    }
}

#[async_trait]
impl SinkFactory for MemoryStore {
    fn sink(&self) -> Box<dyn ChunkSink> {
        Box::new(self.memory_sink())
    }

    async fn load(&self, key: &str) -> StorageResult<Bytes> {
        load_from(&self.objects, key).await
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

pub struct MemorySink {
    objects: ObjectMap,
    current: Option<(String, BytesMut)>,
}

#[async_trait]
impl ChunkSink for MemorySink {
    async fn open(&mut self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.close().await?;
        self.current = Some((key.to_string(), BytesMut::new()));
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> StorageResult<usize> {
        let (_, buffer) = self.current.as_mut().ok_or(StorageError::NotOpen)?;
        buffer.extend_from_slice(data);
        Ok(data.len())
    }

    async fn close(&mut self) -> StorageResult<()> {
        if let Some((key, buffer)) = self.current.take() {
            debug!("committing {} ({} bytes) to memory", key, buffer.len());
            self.objects.lock().await.insert(key, buffer.freeze());
        }
        Ok(())
    }

    async fn discard(&mut self) -> StorageResult<()> {
        self.current = None;
        Ok(())
    }

    async fn load(&self, key: &str) -> StorageResult<Bytes> {
        load_from(&self.objects, key).await
    }
}

async fn load_from(objects: &ObjectMap, key: &str) -> StorageResult<Bytes> {
    objects
        .lock()
        .await
        .get(key)
        .cloned()
        .ok_or_else(|| StorageError::NotFound(key.to_string()))
}
