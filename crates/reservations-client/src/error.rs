//! Client error types

use reservations_core::codec::DecodeError;
use thiserror::Error;

/// Errors talking to the reservations API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the API
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body is not a reservation document
    #[error("Invalid response: {0}")]
    Decode(#[from] DecodeError),

    /// Write acknowledged with `ok: false`
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Local mutations refused before they touch the list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Reservation not found: {0}")]
    NotFound(String),

    #[error("Reservation {id} already has {max} seated guests")]
    TableFull { id: String, max: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
