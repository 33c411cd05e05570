use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of guests that can be seated on one reservation.
///
/// Enforced by whoever adds seats, not by the storage layer.
pub const MAX_SEATS: usize = 5;

/// A single table booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Opaque id, assigned once at creation
    pub id: String,
    /// Physical table; not unique across reservations
    pub table_number: u32,
    /// Display name of the person who made the booking
    pub reserved_by: String,
    /// Scheduled moment as ISO-8601 text
    pub date: String,
    /// Guest names in seat order
    #[serde(default)]
    pub seats: Vec<String>,
}

impl Reservation {
    /// Create a reservation with a fresh id and no seated guests.
    pub fn new(table_number: u32, reserved_by: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            table_number,
            reserved_by: reserved_by.into(),
            date: date.into(),
            seats: Vec::new(),
        }
    }

    pub fn seats_remaining(&self) -> usize {
        MAX_SEATS.saturating_sub(self.seats.len())
    }

    pub fn has_free_seat(&self) -> bool {
        self.seats_remaining() > 0
    }

    /// Whether the reservation is scheduled strictly after `now`.
    ///
    /// Dates that do not parse as RFC 3339 are never considered upcoming.
    pub fn starts_after(&self, now: DateTime<Utc>) -> bool {
        DateTime::parse_from_rfc3339(&self.date)
            .map(|date| date.with_timezone(&Utc) > now)
            .unwrap_or(false)
    }
}
