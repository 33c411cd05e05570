use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use reservations_core::{BlobEntry, BlobStore, PutOptions, StorageError};
use tokio::fs;
use tracing::{debug, instrument};

const TEMP_EXTENSION: &str = "tmp";

/// Local filesystem blob store.
///
/// Object names map to paths under the base directory, `/` separated:
/// ```text
/// {base_dir}/
///   {prefix}/
///     reservations.json
/// ```
/// Content type and visibility are not persisted; files are readable by
/// whoever can read the directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_dir: PathBuf,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore with the given base directory.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Map an object name to its file, refusing names that escape the base directory.
    fn object_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(StorageError::InvalidArgument(format!(
                "Invalid object name: {:?}",
                name
            )));
        }
        Ok(self.base_dir.join(relative))
    }

    fn entry(
        &self,
        name: String,
        path: &Path,
        size_bytes: u64,
        metadata: &std::fs::Metadata,
    ) -> BlobEntry {
        BlobEntry {
            pathname: name,
            url: format!("file://{}", path.display()),
            size_bytes,
            uploaded_at: metadata.modified().ok().map(chrono::DateTime::from),
        }
    }

    /// `{path}.{uuid}.tmp`, unique per call so overlapping writes never share a file.
    fn temp_path(path: &Path) -> PathBuf {
        let mut temp_path = path.as_os_str().to_owned();
        temp_path.push(format!(".{}.{}", uuid::Uuid::new_v4().simple(), TEMP_EXTENSION));
        PathBuf::from(temp_path)
    }

    /// Object name of a file below the base directory.
    fn object_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_dir).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Walk the base directory and collect every stored object.
    async fn walk(&self) -> Result<Vec<(String, PathBuf, std::fs::Metadata)>, StorageError> {
        let mut found = Vec::new();
        if !self.base_dir.exists() {
            return Ok(found);
        }

        let mut pending = vec![self.base_dir.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| {
                StorageError::Io(format!("Failed to read dir {}: {}", dir.display(), e))
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::Io(format!("Failed to read dir entry: {}", e))
            })? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == TEMP_EXTENSION) {
                    continue;
                }
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    // Removed between read_dir and stat
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        return Err(StorageError::Io(format!("Failed to get metadata: {}", e)))
                    }
                };

                if metadata.is_dir() {
                    pending.push(path);
                } else if let Some(name) = self.object_name(&path) {
                    found.push((name, path, metadata));
                }
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self, content, _options), level = "debug", fields(content_len = content.len()))]
    async fn put(
        &self,
        name: &str,
        content: Vec<u8>,
        _options: &PutOptions,
    ) -> Result<BlobEntry, StorageError> {
        let path = self.object_path(name)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::Io(format!("Failed to create dir {}: {}", parent.display(), e))
            })?;
        }

        // Write atomically via a temp file private to this write
        let temp_path = Self::temp_path(&path);
        fs::write(&temp_path, &content).await.map_err(|e| {
            StorageError::Io(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(format!(
                "Failed to rename to {}: {}",
                path.display(),
                e
            )));
        }

        let metadata = fs::metadata(&path).await.map_err(|e| {
            StorageError::Io(format!("Failed to get metadata: {}", e))
        })?;

        debug!("Stored {} ({} bytes)", name, content.len());
        Ok(self.entry(name.to_string(), &path, content.len() as u64, &metadata))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(
        &self,
        prefix: &str,
        limit: Option<usize>,
    ) -> Result<Vec<BlobEntry>, StorageError> {
        let mut matches: Vec<_> = self
            .walk()
            .await?
            .into_iter()
            .filter(|(name, _, _)| name.starts_with(prefix))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        matches.truncate(limit.unwrap_or(usize::MAX));

        Ok(matches
            .into_iter()
            .map(|(name, path, metadata)| self.entry(name, &path, metadata.len(), &metadata))
            .collect())
    }

    #[instrument(skip(self, entry), level = "debug", fields(pathname = %entry.pathname))]
    async fn fetch(&self, entry: &BlobEntry) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(&entry.pathname)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(entry.pathname.clone()))
            }
            Err(e) => Err(StorageError::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reservations_core::DocumentStore;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (LocalBlobStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp_dir.path());
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_put_list_fetch() {
        let (store, _temp) = setup();
        let options = PutOptions::public_json();

        // Initially empty
        assert!(store.list("", None).await.unwrap().is_empty());

        store
            .put("arena/prod/reservations.json", b"[1]".to_vec(), &options)
            .await
            .unwrap();
        let entry = store
            .put("arena/prod/reservations.json", b"[1,2]".to_vec(), &options)
            .await
            .unwrap();
        assert_eq!(entry.size_bytes, 5);
        assert!(entry.url.starts_with("file://"));
        assert!(entry.uploaded_at.is_some());

        let entries = store.list("arena/prod/", None).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pathname, "arena/prod/reservations.json");
        assert_eq!(store.fetch(&entries[0]).await.unwrap(), b"[1,2]");
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let (store, _temp) = setup();
        let options = PutOptions::public_json();
        for name in ["b/reservations.json", "a/reservations.json", "a/other.json"] {
            store.put(name, b"[]".to_vec(), &options).await.unwrap();
        }

        let names: Vec<_> = store
            .list("a/", None)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.pathname)
            .collect();
        assert_eq!(names, vec!["a/other.json", "a/reservations.json"]);

        assert_eq!(store.list("", Some(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let (store, _temp) = setup();
        let options = PutOptions::public_json();

        for name in ["", "../outside.json", "/etc/passwd", "a/../../b.json"] {
            let result = store.put(name, b"[]".to_vec(), &options).await;
            assert!(
                matches!(result, Err(StorageError::InvalidArgument(_))),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let (store, _temp) = setup();
        let entry = BlobEntry {
            pathname: "reservations.json".to_string(),
            url: String::new(),
            size_bytes: 0,
            uploaded_at: None,
        };
        assert!(matches!(
            store.fetch(&entry).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_document_round_trip_on_disk() {
        let (store, temp) = setup();
        let document = DocumentStore::new(Arc::new(store), "ns/reservations.json");
        let records = json!([{"id": "a", "tableNumber": 3, "seats": ["Marko"]}]);

        document.write(records.clone()).await.unwrap();
        assert_eq!(json!(document.read().await.unwrap()), records);
        assert!(temp.path().join("ns").join("reservations.json").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_last_writer_wins() {
        let (store, temp) = setup();
        let document = DocumentStore::new(Arc::new(store), "ns/reservations.json");
        let long = json!((0..200).map(|i| json!({"id": i, "seats": ["a", "b"]})).collect::<Vec<_>>());
        let short = json!([{"id": "short"}]);

        for _ in 0..20 {
            let writes: Vec<_> = (0..8)
                .map(|i| {
                    let document = document.clone();
                    let payload = if i % 2 == 0 { long.clone() } else { short.clone() };
                    tokio::spawn(async move { document.write(payload).await })
                })
                .collect();
            for write in writes {
                write.await.unwrap().unwrap();
            }

            let stored = json!(document.read().await.unwrap());
            assert!(stored == long || stored == short, "torn document: {}", stored);
        }

        let leftovers: Vec<_> = std::fs::read_dir(temp.path().join("ns"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, vec!["reservations.json"]);
    }
}
