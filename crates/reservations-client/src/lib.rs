//! Client-side state for the shared reservation document.
//!
//! - `ReservationsApi`: the read/write endpoints as seen by the client
//! - `HttpReservationsApi`: reqwest implementation of that seam
//! - `ReservationSync`: in-memory list, loaded once, written back on every change

mod api;
mod error;
mod sync;

pub use api::{ClientConfig, HttpReservationsApi, ReservationsApi};
pub use error::{ClientError, ClientResult, SyncError};
pub use sync::{LoadOutcome, LoadPhase, Persist, ReservationSync};
