//! Wire frames exchanged over the chat socket
//!
//! Every frame is a JSON object discriminated by its `type` field.

use serde::{Deserialize, Serialize};

/// Frames sent from the client to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// A user message starting a new turn
    Message { content: String },
}

impl ClientFrame {
    pub fn message(content: impl Into<String>) -> Self {
        ClientFrame::Message {
            content: content.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames received from the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// The assistant finished its turn
    Complete { content: String },
    /// Any frame type this client does not act on
    #[serde(other)]
    Unknown,
}

impl ServerFrame {
    /// Parse an inbound text frame. Malformed JSON yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
