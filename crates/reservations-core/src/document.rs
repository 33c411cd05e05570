use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::codec::{self, DecodeError};
use crate::error::StorageError;
use crate::store::{BlobEntry, BlobStore, PutOptions};

/// Why the document could not be read.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// The single reservation document living under a well-known key.
///
/// Every read returns the whole document and every write replaces it.
/// There is no version check: concurrent writers race and the last `put` wins.
#[derive(Clone)]
pub struct DocumentStore {
    store: Arc<dyn BlobStore>,
    key: String,
}

impl DocumentStore {
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Find the stored entry for the document.
    ///
    /// Prefers an exact pathname match and falls back to the first object
    /// listed under the key, for backends that report different paths.
    pub async fn locate(&self) -> Result<Option<BlobEntry>, StorageError> {
        let mut entries = self.store.list(&self.key, None).await?;
        if let Some(pos) = entries.iter().position(|e| e.pathname == self.key) {
            return Ok(Some(entries.swap_remove(pos)));
        }
        Ok(entries.into_iter().next())
    }

    /// Read the document, reporting storage and decode failures.
    ///
    /// A document that was never written reads as empty.
    #[instrument(skip(self), level = "debug", fields(key = %self.key))]
    pub async fn read(&self) -> Result<Vec<Value>, ReadError> {
        let Some(entry) = self.locate().await? else {
            debug!("No document stored yet");
            return Ok(Vec::new());
        };
        let bytes = self.store.fetch(&entry).await?;
        let records = codec::decode_document(&bytes)?;
        debug!(
            uploaded_at = ?entry.uploaded_at,
            "Read {} records from {}",
            records.len(),
            entry.pathname
        );
        Ok(records)
    }

    /// Read the document, degrading every failure to an empty list.
    pub async fn read_or_empty(&self) -> Vec<Value> {
        match self.read().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Serving empty reservation list for {}: {}", self.key, e);
                Vec::new()
            }
        }
    }

    /// Replace the whole document. Non-array values are stored as `[]`.
    #[instrument(skip(self, value), level = "debug", fields(key = %self.key))]
    pub async fn write(&self, value: Value) -> Result<BlobEntry, StorageError> {
        let records = codec::coerce_document(value);
        let bytes = codec::encode_document(&records)?;
        let entry = self
            .store
            .put(&self.key, bytes, &PutOptions::public_json())
            .await?;
        debug!("Wrote {} records to {}", records.len(), entry.pathname);
        Ok(entry)
    }
}
