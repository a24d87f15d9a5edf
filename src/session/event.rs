//! Events that can occur in a session

use super::state::Generation;

/// Events that trigger state transitions
///
/// Connection events carry the generation of the physical attempt that
/// produced them so late arrivals from a superseded attempt can be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    Activate,
    Deactivate,

    // Connection events
    Opened {
        generation: Generation,
    },
    Frame {
        generation: Generation,
        text: String,
    },
    Closed {
        generation: Generation,
    },
    Errored {
        generation: Generation,
        message: String,
    },
    ReconnectDue {
        generation: Generation,
    },

    // User events
    Submit {
        text: String,
    },
    /// Clear a turn left waiting after a connection drop
    Reset,
}

impl Event {
    /// Generation stamp for connection events
    pub fn generation(&self) -> Option<Generation> {
        match self {
            Event::Opened { generation }
            | Event::Frame { generation, .. }
            | Event::Closed { generation }
            | Event::Errored { generation, .. }
            | Event::ReconnectDue { generation } => Some(*generation),
            Event::Activate | Event::Deactivate | Event::Submit { .. } | Event::Reset => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::Activate => "activate",
            Event::Deactivate => "deactivate",
            Event::Opened { .. } => "opened",
            Event::Frame { .. } => "frame",
            Event::Closed { .. } => "closed",
            Event::Errored { .. } => "errored",
            Event::ReconnectDue { .. } => "reconnect_due",
            Event::Submit { .. } => "submit",
            Event::Reset => "reset",
        }
    }
}
