//! Daybook chat - real-time chat session core
//!
//! Keeps one conversational turn at a time flowing between a user and the
//! daybook assistant over a WebSocket, reconnecting with capped exponential
//! backoff and telling the rest of the app which data went stale once a
//! turn completes.
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod config;
pub mod invalidation;
pub mod protocol;
pub mod runtime;
pub mod session;
pub mod transcript;

pub use config::{ConfigError, SessionConfig};
pub use invalidation::{ChannelDispatcher, LoggingDispatcher, Topic, TopicSet};
pub use runtime::{
    activate, activate_with, start, HistoryError, HistorySource, InvalidationDispatcher,
    SessionError, SessionHandle, SessionUpdate, Transport, TransportError,
};
pub use session::{ConnectionState, SessionStatus, TransitionError};
pub use transcript::{Message, PersistedMessage, Role};
