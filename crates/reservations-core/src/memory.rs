use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StorageError;
use crate::store::{BlobEntry, BlobStore, PutOptions};

#[derive(Debug, Clone)]
struct StoredBlob {
    content: Vec<u8>,
    content_type: String,
    uploaded_at: DateTime<Utc>,
}

/// In-process blob store.
///
/// Contents are lost when the process exits. Also used as the store double in tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, StoredBlob>>,
    puts: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls served so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Raw content stored under `name`.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.read_blobs().get(name).map(|b| b.content.clone())
    }

    /// Content type recorded for `name`.
    pub fn content_type(&self, name: &str) -> Option<String> {
        self.read_blobs().get(name).map(|b| b.content_type.clone())
    }

    /// Store bytes directly, bypassing `put` accounting.
    pub fn insert_raw(&self, name: &str, content: impl Into<Vec<u8>>) {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name.to_string(),
                StoredBlob {
                    content: content.into(),
                    content_type: "application/octet-stream".to_string(),
                    uploaded_at: Utc::now(),
                },
            );
    }

    fn read_blobs(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, StoredBlob>> {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(name: &str, blob: &StoredBlob) -> BlobEntry {
        BlobEntry {
            pathname: name.to_string(),
            url: format!("memory://{}", name),
            size_bytes: blob.content.len() as u64,
            uploaded_at: Some(blob.uploaded_at),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn put(
        &self,
        name: &str,
        content: Vec<u8>,
        options: &PutOptions,
    ) -> Result<BlobEntry, StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidArgument("empty object name".to_string()));
        }
        let blob = StoredBlob {
            content,
            content_type: options.content_type.clone(),
            uploaded_at: Utc::now(),
        };
        let entry = Self::entry(name, &blob);

        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), blob);
        self.puts.fetch_add(1, Ordering::SeqCst);

        debug!("Stored {} in memory ({} bytes)", name, entry.size_bytes);
        Ok(entry)
    }

    async fn list(
        &self,
        prefix: &str,
        limit: Option<usize>,
    ) -> Result<Vec<BlobEntry>, StorageError> {
        let blobs = self.read_blobs();
        let entries = blobs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(name, blob)| Self::entry(name, blob))
            .collect();
        Ok(entries)
    }

    async fn fetch(&self, entry: &BlobEntry) -> Result<Vec<u8>, StorageError> {
        self.contents(&entry.pathname)
            .ok_or_else(|| StorageError::NotFound(entry.pathname.clone()))
    }
}
