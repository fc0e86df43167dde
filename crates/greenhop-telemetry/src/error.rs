//! Telemetry error types.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context} returned {status}")]
    Status { context: String, status: u16 },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("no data for region {0}")]
    UnknownRegion(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;
