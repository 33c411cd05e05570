use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;

/// Content type the reservation document is stored with.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Options for a `put`. Stored objects are always publicly readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
}

impl PutOptions {
    /// Publicly readable JSON, overwriting in place.
    pub fn public_json() -> Self {
        Self {
            content_type: JSON_CONTENT_TYPE.to_string(),
        }
    }
}

/// An object as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Key of the object inside the store
    pub pathname: String,
    /// Where the object can be read from
    pub url: String,
    pub size_bytes: u64,
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Opaque object store holding the reservation document.
///
/// Only overwrite-put and prefix-list are required; `fetch` reads back an
/// entry previously returned by `list` or `put`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the backend identifier (e.g., "memory", "local", "r2").
    fn backend_name(&self) -> &'static str;

    /// Write `content` under `name`, replacing any existing object.
    async fn put(
        &self,
        name: &str,
        content: Vec<u8>,
        options: &PutOptions,
    ) -> Result<BlobEntry, StorageError>;

    /// List objects whose name starts with `prefix`, ordered by name.
    async fn list(&self, prefix: &str, limit: Option<usize>)
        -> Result<Vec<BlobEntry>, StorageError>;

    /// Read the content of an entry.
    async fn fetch(&self, entry: &BlobEntry) -> Result<Vec<u8>, StorageError>;
}
