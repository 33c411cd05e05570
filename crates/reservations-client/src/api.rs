//! The reservations API as seen from the client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reservations_core::{codec, Reservation};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{ClientError, ClientResult};

/// Whole-document read and write.
///
/// `ReservationSync` only talks to the API through this trait, so tests and
/// embedders can substitute their own transport.
#[async_trait]
pub trait ReservationsApi: Send + Sync {
    /// Fetch the current document.
    async fn fetch(&self) -> ClientResult<Vec<Reservation>>;

    /// Replace the document with `reservations`.
    async fn save(&self, reservations: &[Reservation]) -> ClientResult<()>;
}

/// Connection settings for `HttpReservationsApi`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Per-request timeout; `None` leaves it to the transport
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Acknowledgement body of a write.
#[derive(Deserialize)]
struct WriteAck {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// reqwest-backed implementation of `ReservationsApi`.
#[derive(Debug, Clone)]
pub struct HttpReservationsApi {
    client: Client,
    endpoint: String,
}

impl HttpReservationsApi {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: format!("{}/reservations", config.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn check_status(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ReservationsApi for HttpReservationsApi {
    #[instrument(skip(self), level = "debug", fields(endpoint = %self.endpoint))]
    async fn fetch(&self) -> ClientResult<Vec<Reservation>> {
        let response = self.client.get(&self.endpoint).send().await?;
        let bytes = Self::check_status(response).await?.bytes().await?;
        let reservations = codec::decode_document(&bytes)?;
        debug!("Fetched {} reservations", reservations.len());
        Ok(reservations)
    }

    #[instrument(skip(self, reservations), level = "debug", fields(count = reservations.len()))]
    async fn save(&self, reservations: &[Reservation]) -> ClientResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(reservations)
            .send()
            .await?;
        let ack: WriteAck = Self::check_status(response).await?.json().await?;
        if ack.ok {
            Ok(())
        } else {
            Err(ClientError::Rejected(ack.error.unwrap_or_default()))
        }
    }
}
