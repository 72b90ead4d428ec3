//! Error types for payload parsing, the live stream, and history loading.

use thiserror::Error;

/// A single inbound payload could not be understood. The payload is dropped.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Not JSON, or JSON whose shape does not match the expected record
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Tile feature from a source layer this client does not describe
    #[error("Unknown tile layer: {0}")]
    UnknownLayer(String),
}

/// Errors from the live stream lifecycle.
#[derive(Debug, Error)]
pub enum StreamError {
    /// `activate()` was called while a connection is already open
    #[error("Live stream is already active")]
    AlreadyActive,

    /// The connection could not be opened
    #[error("Connect error: {0}")]
    Connect(String),

    /// The open connection failed
    #[error("Transport error: {0}")]
    Transport(String),
}

impl StreamError {
    pub fn connect(msg: impl std::fmt::Display) -> Self {
        Self::Connect(msg.to_string())
    }

    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }
}

/// Errors from fetching a past trip.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The selected vehicle does not carry a journey and operating day
    #[error("Selection has no journey reference: {0}")]
    MissingJourney(String),

    /// Network failure before a response arrived
    #[error("Request error: {0}")]
    Request(String),

    /// The service answered with a non-success status
    #[error("HTTP {0}")]
    Status(u16),

    /// The response body was not a list of positions
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for HistoryError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.to_string())
    }
}

#[cfg(feature = "live")]
impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
