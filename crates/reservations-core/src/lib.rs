//! Core types and abstractions for the reservations service.
//!
//! This crate holds everything the server and the client agree on:
//! - `Reservation`: the record type and its seat limit
//! - `codec`: encoding/decoding of the whole reservation document
//! - `BlobStore`: the opaque object store the document lives in
//! - `DocumentStore`: read/write semantics of the single shared document

pub mod codec;
mod document;
mod error;
mod key;
mod memory;
mod model;
mod store;

pub use codec::DecodeError;
pub use document::{DocumentStore, ReadError};
pub use error::StorageError;
pub use key::{document_key, DOCUMENT_NAME};
pub use memory::MemoryBlobStore;
pub use model::{Reservation, MAX_SEATS};
pub use store::{BlobEntry, BlobStore, PutOptions, JSON_CONTENT_TYPE};
