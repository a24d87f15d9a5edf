//! Session state types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifies one physical connection attempt
pub type Generation = u64;

/// Connectivity of the logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    #[default]
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        }
    }
}

/// Capped exponential reconnect delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            max: Duration::from_millis(30_000),
        }
    }
}

impl Backoff {
    /// Delay before reconnecting after `retry_count` consecutive failures:
    /// `min(base * 2^retry_count, max)`.
    pub fn delay(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Immutable per-session context
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub backoff: Backoff,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            session_id: session_id.into(),
            backoff,
        }
    }
}

/// Mutable session state, owned by the event loop
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub connection: ConnectionState,
    /// Consecutive closes since the last successful open
    pub retry_count: u32,
    /// Generation of the current physical connection attempt; 0 before activation
    pub generation: Generation,
    /// A user turn is awaiting its completion
    pub waiting: bool,
    pub deactivated: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an event stamped with `generation` belongs to the current attempt
    pub fn is_current(&self, generation: Generation) -> bool {
        !self.deactivated && generation == self.generation
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            connection: self.connection,
            waiting: self.waiting,
        }
    }
}

/// What observers need to gate input: connectivity and turn state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionStatus {
    pub connection: ConnectionState,
    pub waiting: bool,
}

impl SessionStatus {
    /// Whether a submit would currently be accepted (ignoring its text)
    pub fn can_submit(&self) -> bool {
        self.connection == ConnectionState::Open && !self.waiting
    }
}
