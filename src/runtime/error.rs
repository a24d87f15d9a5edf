//! Runtime error types

use crate::transcript::TranscriptError;
use thiserror::Error;

/// Failure of a physical connection. Never surfaced to callers: the session
/// reconnects instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
}

impl TransportError {
    pub fn handshake(err: impl std::fmt::Display) -> Self {
        Self::Handshake(err.to_string())
    }

    pub fn send(err: impl std::fmt::Display) -> Self {
        Self::Send(err.to_string())
    }

    pub fn receive(err: impl std::fmt::Display) -> Self {
        Self::Receive(err.to_string())
    }
}

/// Failure fetching persisted history
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{detail}")]
    Status { status: u16, detail: String },
    #[error("history response was not a message list: {0}")]
    Decode(String),
}

impl HistoryError {
    /// HTTP status of a rejected request
    pub fn status(&self) -> Option<u16> {
        match self {
            HistoryError::Status { status, .. } => Some(*status),
            HistoryError::Http(e) => e.status().map(|s| s.as_u16()),
            HistoryError::Decode(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
    #[error("session is no longer running")]
    Closed,
}
