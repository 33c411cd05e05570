use std::path::PathBuf;

use clap::Parser;
use reservations_core::document_key;

/// Configuration for the reservations server.
#[derive(Parser, Debug, Clone)]
#[command(name = "reservations-server")]
#[command(about = "Read/write API for the shared reservation document")]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "RESERVATIONS_HOST")]
    pub host: String,

    /// Port to bind to
    #[arg(long, default_value = "8080", env = "RESERVATIONS_PORT")]
    pub port: u16,

    /// Blob store holding the document
    #[arg(long, default_value = "local", env = "STORAGE_BACKEND")]
    pub storage_backend: StorageBackend,

    /// Namespace prepended to the document key (e.g. "arena-app/prod")
    #[arg(long, env = "BLOB_PREFIX")]
    pub blob_prefix: Option<String>,

    /// Base directory for the local backend
    #[arg(long, env = "LOCAL_STORAGE_DIR")]
    pub local_storage_dir: Option<PathBuf>,

    /// Cloudflare account ID (derives the R2 endpoint)
    #[arg(long, env = "CLOUDFLARE_ACCOUNT_ID")]
    pub cloudflare_account_id: Option<String>,

    /// S3-compatible endpoint, overrides the one derived from the account ID
    #[arg(long, env = "R2_ENDPOINT")]
    pub r2_endpoint: Option<String>,

    /// R2 bucket name
    #[arg(long, env = "R2_BUCKET_NAME")]
    pub r2_bucket_name: Option<String>,

    /// R2 access key ID (for S3-compatible API)
    #[arg(long, env = "R2_ACCESS_KEY_ID")]
    pub r2_access_key_id: Option<String>,

    /// R2 secret access key (for S3-compatible API)
    #[arg(long, env = "R2_SECRET_ACCESS_KEY")]
    pub r2_secret_access_key: Option<String>,

    /// Public base URL objects are served from (e.g. an r2.dev bucket domain)
    #[arg(long, env = "R2_PUBLIC_URL")]
    pub r2_public_url: Option<String>,

    /// Send a public-read ACL with every upload (S3 buckets with ACLs enabled)
    #[arg(long, default_value_t = false, env = "R2_PUBLIC_ACL")]
    pub r2_public_acl: bool,

    /// Maximum accepted request body size in bytes
    #[arg(long, default_value = "1048576", env = "MAX_BODY_BYTES")]
    pub max_body_bytes: usize,
}

impl Config {
    /// Storage key of the reservation document.
    pub fn document_key(&self) -> String {
        document_key(self.blob_prefix.as_deref())
    }

    /// Get the effective local storage directory.
    pub fn effective_local_storage_dir(&self) -> PathBuf {
        self.local_storage_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("reservations")
        })
    }

    /// Get the R2 endpoint URL for S3-compatible API.
    pub fn effective_r2_endpoint(&self) -> Option<String> {
        self.r2_endpoint.clone().or_else(|| {
            self.cloudflare_account_id
                .as_ref()
                .map(|id| format!("https://{}.r2.cloudflarestorage.com", id))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageBackend {
    Memory,
    Local,
    R2,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::R2 => write!(f, "r2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["reservations-server"]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert!(!config.r2_public_acl);
    }

    #[test]
    fn test_document_key_uses_prefix() {
        let config = Config::parse_from(["reservations-server", "--blob-prefix", "arena-app/prod/"]);
        assert_eq!(config.document_key(), "arena-app/prod/reservations.json");
    }

    #[test]
    fn test_r2_endpoint() {
        let config = Config::parse_from([
            "reservations-server",
            "--storage-backend",
            "r2",
            "--cloudflare-account-id",
            "abc123",
        ]);
        assert_eq!(
            config.effective_r2_endpoint().as_deref(),
            Some("https://abc123.r2.cloudflarestorage.com")
        );

        let config = Config::parse_from([
            "reservations-server",
            "--cloudflare-account-id",
            "abc123",
            "--r2-endpoint",
            "http://localhost:9000",
        ]);
        assert_eq!(
            config.effective_r2_endpoint().as_deref(),
            Some("http://localhost:9000")
        );
    }
}
