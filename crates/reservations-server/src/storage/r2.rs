use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;
use reservations_core::{BlobEntry, BlobStore, PutOptions, StorageError};
use tracing::{debug, instrument};

/// Cloudflare R2 (S3-compatible) blob store.
///
/// Storage layout in R2:
/// ```text
/// {bucket}/
///   {prefix}/
///     reservations.json
/// ```
///
/// R2 has no per-object ACLs: public visibility comes from the bucket's
/// public domain, configured as `public_base_url`. Against S3 proper,
/// `send_public_acl` adds a `public-read` canned ACL to every upload.
#[derive(Clone)]
pub struct R2BlobStore {
    s3_client: S3Client,
    bucket_name: String,
    public_base_url: Option<String>,
    send_public_acl: bool,
}

impl R2BlobStore {
    /// Create a new R2BlobStore backend.
    pub fn new(
        s3_client: S3Client,
        bucket_name: String,
        public_base_url: Option<String>,
        send_public_acl: bool,
    ) -> Self {
        Self {
            s3_client,
            bucket_name,
            public_base_url,
            send_public_acl,
        }
    }

    /// URL an object is served from.
    fn object_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("r2://{}/{}", self.bucket_name, key),
        }
    }
}

#[async_trait]
impl BlobStore for R2BlobStore {
    fn backend_name(&self) -> &'static str {
        "r2"
    }

    #[instrument(skip(self, content, options), level = "debug", fields(content_len = content.len()))]
    async fn put(
        &self,
        name: &str,
        content: Vec<u8>,
        options: &PutOptions,
    ) -> Result<BlobEntry, StorageError> {
        let key = name.to_string();
        let size_bytes = content.len() as u64;

        let mut request = self
            .s3_client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(&options.content_type)
            .body(ByteStream::from(content));

        if self.send_public_acl {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::Io(format!("R2 put_object error: {}", e)))?;

        debug!("Stored {} in R2 ({} bytes)", key, size_bytes);
        Ok(BlobEntry {
            url: self.object_url(&key),
            pathname: key,
            size_bytes,
            uploaded_at: Some(chrono::Utc::now()),
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(
        &self,
        prefix: &str,
        limit: Option<usize>,
    ) -> Result<Vec<BlobEntry>, StorageError> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut entries = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .s3_client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(prefix);

            if let Ok(page_size) = i32::try_from(limit - entries.len()) {
                request = request.max_keys(page_size.min(1000));
            }

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request
                .send()
                .await
                .map_err(|e| StorageError::Io(format!("R2 list_objects error: {}", e)))?;

            for obj in output.contents.unwrap_or_default() {
                let Some(key) = obj.key else { continue };
                entries.push(BlobEntry {
                    url: self.object_url(&key),
                    pathname: key,
                    size_bytes: obj.size.unwrap_or(0).max(0) as u64,
                    uploaded_at: obj
                        .last_modified
                        .and_then(|dt| chrono::DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())),
                });
            }

            if entries.len() >= limit {
                entries.truncate(limit);
                break;
            }

            if output.is_truncated.unwrap_or(false) {
                continuation_token = output.next_continuation_token;
            } else {
                break;
            }
        }

        debug!("Listed {} objects under {:?}", entries.len(), prefix);
        Ok(entries)
    }

    #[instrument(skip(self, entry), level = "debug", fields(pathname = %entry.pathname))]
    async fn fetch(&self, entry: &BlobEntry) -> Result<Vec<u8>, StorageError> {
        let result = self
            .s3_client
            .get_object()
            .bucket(&self.bucket_name)
            .key(&entry.pathname)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(format!("Failed to read R2 object body: {}", e)))?
                    .into_bytes();
                Ok(bytes.to_vec())
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    Err(StorageError::NotFound(entry.pathname.clone()))
                } else {
                    Err(StorageError::Io(format!("R2 get_object error: {}", service_error)))
                }
            }
        }
    }
}
