//! Pure state transition function
//!
//! Given the same state and event this always produces the same result. All
//! I/O is described by the returned effects and performed by the runtime.

use super::state::{ConnectionState, SessionContext, SessionState};
use super::{Effect, Event};
use crate::protocol::ServerFrame;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
    /// Set when the event was dropped without changing anything
    pub ignored: Option<Ignored>,
}

/// Why an event was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// Stamped with a superseded generation, or arrived after deactivation
    Stale,
    /// Inbound frame that is malformed or of a type this client does not handle
    UnrecognizedFrame,
    /// Not meaningful in the current connection state
    NotApplicable,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
            ignored: None,
        }
    }

    pub fn ignored(state: &SessionState, reason: Ignored) -> Self {
        Self {
            new_state: state.clone(),
            effects: vec![],
            ignored: Some(reason),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Reasons a submit is refused. The refusal changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("not connected")]
    NotConnected,
    #[error("waiting for the assistant to finish the current turn")]
    TurnInFlight,
    #[error("session is deactivated")]
    Deactivated,
}

pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    if state.deactivated {
        return match event {
            Event::Submit { .. } => Err(TransitionError::Deactivated),
            _ => Ok(TransitionResult::ignored(state, Ignored::Stale)),
        };
    }

    // Staleness guard
    if let Some(generation) = event.generation() {
        if !state.is_current(generation) {
            return Ok(TransitionResult::ignored(state, Ignored::Stale));
        }
    }

    match (state.connection, event) {
        // ============================================================
        // Lifecycle
        // ============================================================
        (ConnectionState::Closed, Event::Activate) if state.generation == 0 => {
            Ok(connect_next(state))
        }

        (_, Event::Deactivate) => Ok(TransitionResult::new(SessionState {
            connection: ConnectionState::Closed,
            generation: state.generation + 1,
            deactivated: true,
            ..state.clone()
        })
        .with_effect(Effect::CancelReconnect)
        .with_effect(Effect::CloseConnection)
        .with_effect(Effect::Stop)),

        // ============================================================
        // Connection
        // ============================================================
        (ConnectionState::Connecting, Event::Opened { .. }) => {
            Ok(TransitionResult::new(SessionState {
                connection: ConnectionState::Open,
                retry_count: 0,
                ..state.clone()
            }))
        }

        (ConnectionState::Open, Event::Frame { text, .. }) => match ServerFrame::parse(&text) {
            Some(ServerFrame::Complete { content }) => Ok(TransitionResult::new(SessionState {
                waiting: false,
                ..state.clone()
            })
            .with_effect(Effect::append_assistant(content))
            .with_effect(Effect::invalidate_turn())),
            Some(ServerFrame::Unknown) | None => {
                Ok(TransitionResult::ignored(state, Ignored::UnrecognizedFrame))
            }
        },

        // Errors are handled like closes: the socket is released and retried
        (
            ConnectionState::Connecting | ConnectionState::Open,
            Event::Closed { generation } | Event::Errored { generation, .. },
        ) => {
            let delay = context.backoff.delay(state.retry_count);
            let retry_count = state.retry_count.saturating_add(1);
            Ok(TransitionResult::new(SessionState {
                connection: ConnectionState::Closed,
                retry_count,
                ..state.clone()
            })
            .with_effect(Effect::CloseConnection)
            .with_effect(Effect::ScheduleReconnect {
                generation,
                delay,
                retry_count,
            }))
        }

        (ConnectionState::Closed, Event::ReconnectDue { .. }) => Ok(connect_next(state)),

        // ============================================================
        // Turns
        // ============================================================
        (connection, Event::Submit { text }) => {
            if text.trim().is_empty() {
                Err(TransitionError::EmptyMessage)
            } else if connection != ConnectionState::Open {
                Err(TransitionError::NotConnected)
            } else if state.waiting {
                Err(TransitionError::TurnInFlight)
            } else {
                Ok(TransitionResult::new(SessionState {
                    waiting: true,
                    ..state.clone()
                })
                .with_effect(Effect::append_user(text.clone()))
                .with_effect(Effect::send_message(state.generation, text)))
            }
        }

        (_, Event::Reset) if state.waiting => Ok(TransitionResult::new(SessionState {
            waiting: false,
            ..state.clone()
        })),

        _ => Ok(TransitionResult::ignored(state, Ignored::NotApplicable)),
    }
}

/// Start a new physical attempt under a fresh generation
fn connect_next(state: &SessionState) -> TransitionResult {
    let generation = state.generation + 1;
    TransitionResult::new(SessionState {
        connection: ConnectionState::Connecting,
        generation,
        ..state.clone()
    })
    .with_effect(Effect::Connect { generation })
}
