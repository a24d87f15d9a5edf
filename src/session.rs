//! Session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! connection lifecycle, reconnect backoff, the staleness guard and turn
//! serialization all live in [`transition`].

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{
    Backoff, ConnectionState, Generation, SessionContext, SessionState, SessionStatus,
};
pub use transition::{transition, Ignored, TransitionError, TransitionResult};
