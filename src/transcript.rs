//! Ordered, append-only conversation transcript
//!
//! The transcript is seeded once from persisted history and then only grows.
//! It is never the system of record; the backend's history is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in the live transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A message as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<PersistedMessage> for Message {
    fn from(persisted: PersistedMessage) -> Self {
        Self {
            role: persisted.role,
            content: persisted.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("transcript was already seeded")]
    AlreadySeeded,
    #[error("cannot seed a transcript holding {0} live messages")]
    NotEmpty(usize),
}

/// The session's transcript
#[derive(Debug, Default)]
pub struct TranscriptStore {
    messages: Vec<Message>,
    seeded: bool,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the empty transcript with persisted history, keeping its order.
    ///
    /// Must be called before any [`append`](Self::append), and at most once.
    pub fn seed(
        &mut self,
        history: impl IntoIterator<Item = PersistedMessage>,
    ) -> Result<(), TranscriptError> {
        if self.seeded {
            return Err(TranscriptError::AlreadySeeded);
        }
        if !self.messages.is_empty() {
            return Err(TranscriptError::NotEmpty(self.messages.len()));
        }
        self.messages = history.into_iter().map(Message::from).collect();
        self.seeded = true;
        Ok(())
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Current ordered sequence, for read-only consumers
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}
