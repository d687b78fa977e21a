//! Error types shared by the transport and the console.

use thiserror::Error;

/// Transport-level failure. None of these are fatal: the console turns them
/// into notices or error entries and stays interactive.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Engine unreachable or the handshake was refused.
    #[error("Connection failed: {0}")]
    Connection(String),
    /// Handshake did not finish within the connect timeout, or a reply did
    /// not arrive within the request timeout.
    #[error("Connection timeout. Ensure kdb+ is running on the correct port.")]
    Timeout,
    #[error("Not connected to kdb+")]
    NotConnected,
    /// Socket closed while a request was outstanding.
    #[error("Connection closed before a reply arrived")]
    Closed,
    #[error("Send failed: {0}")]
    Send(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::Connection(e.to_string())
    }
}

/// Logical failure reported inside a successfully delivered reply, e.g.
/// `{"error":"ExecutionError","msg":"type"}`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("KDB+ Error: {message}")]
pub struct EngineFailure {
    pub message: String,
}
