//! Durable backend: one file per key under a configured root directory.
//!
//! Writes land in a `.tmp-{uuid}` file next to the target and are renamed
//! into place on `close`, so a key only ever names a complete object.

use crate::services::chunk_sink::{
    ChunkSink, SinkFactory, StorageError, StorageResult, validate_key,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Shared handle to the storage root.
#[derive(Clone, Debug)]
pub struct DiskStore {
    root: Arc<PathBuf>,
}

impl DiskStore {
    /// Create the store, making sure `root` exists.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SinkFactory for DiskStore {
    fn sink(&self) -> Box<dyn ChunkSink> {
        Box::new(DiskSink::new(self.root.clone()))
    }

    async fn load(&self, key: &str) -> StorageResult<Bytes> {
        read_object(&self.root, key).await
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}

/// An object being written: the temp file and where it goes on commit.
struct PendingFile {
    key: String,
    file: File,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

/// Per-session cursor over a [`DiskStore`].
pub struct DiskSink {
    root: Arc<PathBuf>,
    pending: Option<PendingFile>,
}

impl DiskSink {
    pub fn new(root: Arc<PathBuf>) -> Self {
        Self {
            root,
            pending: None,
        }
    }

    async fn commit(pending: PendingFile) -> StorageResult<()> {
        let PendingFile {
            key,
            mut file,
            tmp_path,
            final_path,
        } = pending;

        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        if let Err(err) = publish(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        debug!("committed {} to {}", key, final_path.display());
        Ok(())
    }
}

#[async_trait]
impl ChunkSink for DiskSink {
    #[instrument(skip(self), fields(backend = "disk"))]
    async fn open(&mut self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        if let Some(previous) = self.pending.take() {
            Self::commit(previous).await?;
        }

        let final_path = self.root.join(key);
        let tmp_path = self.root.join(format!(".tmp-{}", Uuid::new_v4()));
        let file = File::create(&tmp_path).await?;
        debug!("opened {} for {}", tmp_path.display(), key);

        self.pending = Some(PendingFile {
            key: key.to_string(),
            file,
            tmp_path,
            final_path,
        });
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> StorageResult<usize> {
        let pending = self.pending.as_mut().ok_or(StorageError::NotOpen)?;
        pending.file.write_all(data).await?;
        Ok(data.len())
    }

    #[instrument(skip(self), fields(backend = "disk"))]
    async fn close(&mut self) -> StorageResult<()> {
        match self.pending.take() {
            Some(pending) => Self::commit(pending).await,
            None => Ok(()),
        }
    }

    #[instrument(skip(self), fields(backend = "disk"))]
    async fn discard(&mut self) -> StorageResult<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        drop(pending.file);
        match fs::remove_file(&pending.tmp_path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    async fn load(&self, key: &str) -> StorageResult<Bytes> {
        read_object(&self.root, key).await
    }
}

impl Drop for DiskSink {
    fn drop(&mut self) {
        // Dropped mid-write (cancelled session): never leave the temp file behind.
        if let Some(pending) = self.pending.take() {
            if let Err(err) = std::fs::remove_file(&pending.tmp_path) {
                if err.kind() != ErrorKind::NotFound {
                    warn!(
                        "failed to remove abandoned temp file {}: {}",
                        pending.tmp_path.display(),
                        err
                    );
                }
            }
        }
    }
}

/// Move a finished temp file into place, replacing any previous object.
async fn publish(tmp_path: &Path, final_path: &Path) -> std::io::Result<()> {
    match fs::rename(tmp_path, final_path).await {
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            fs::remove_file(final_path).await?;
            fs::rename(tmp_path, final_path).await
        }
        other => other,
    }
}

async fn read_object(root: &Path, key: &str) -> StorageResult<Bytes> {
    validate_key(key)?;
    let path = root.join(key);
    match fs::read(&path).await {
        Ok(data) => Ok(Bytes::from(data)),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.into())),
        Err(err) => Err(StorageError::Io(err)),
    }
}
