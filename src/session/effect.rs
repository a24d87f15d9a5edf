//! Effects produced by state transitions

use super::state::Generation;
use crate::invalidation::{turn_complete_topics, TopicSet};
use crate::protocol::ClientFrame;
use crate::transcript::Message;
use std::time::Duration;

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a new physical connection tagged with `generation`
    Connect { generation: Generation },

    /// Send a frame on the connection of `generation`
    Send {
        generation: Generation,
        frame: ClientFrame,
    },

    /// Close and release the active physical connection, if any
    CloseConnection,

    /// Fire `ReconnectDue { generation }` after `delay`
    ScheduleReconnect {
        generation: Generation,
        delay: Duration,
        retry_count: u32,
    },

    /// Cancel a pending reconnect timer
    CancelReconnect,

    /// Append to the transcript
    AppendMessage(Message),

    /// Tell dependent caches to refresh
    Invalidate(TopicSet),

    /// Stop the event loop
    Stop,
}

impl Effect {
    pub fn send_message(generation: Generation, text: impl Into<String>) -> Self {
        Effect::Send {
            generation,
            frame: ClientFrame::message(text),
        }
    }

    pub fn append_user(text: impl Into<String>) -> Self {
        Effect::AppendMessage(Message::user(text))
    }

    pub fn append_assistant(text: impl Into<String>) -> Self {
        Effect::AppendMessage(Message::assistant(text))
    }

    pub fn invalidate_turn() -> Self {
        Effect::Invalidate(turn_complete_topics())
    }
}
