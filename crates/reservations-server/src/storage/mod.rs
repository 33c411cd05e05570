mod local;
mod r2;

pub use local::LocalBlobStore;
pub use r2::R2BlobStore;
