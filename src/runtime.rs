//! Runtime for a live chat session
//!
//! A session is activated by seeding the transcript from persisted history
//! and spawning the event loop; it lives until its handle is deactivated or
//! dropped.

mod error;
mod executor;
pub mod history;
pub mod traits;
pub mod websocket;


pub use error::{HistoryError, SessionError, TransportError};
pub use executor::SessionRuntime;
pub use history::HttpHistorySource;
pub use traits::*;
pub use websocket::WebSocketTransport;

use crate::config::SessionConfig;
use crate::invalidation::TopicSet;
use crate::session::{ConnectionState, Event, SessionContext, SessionStatus, TransitionError};
use crate::transcript::{Message, PersistedMessage, TranscriptStore};
use chrono::NaiveDate;
use futures::stream::Stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Notifications for observers of a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    StateChanged {
        connection: ConnectionState,
    },
    MessageAppended {
        message: Message,
    },
    Invalidated {
        topics: TopicSet,
    },
    ReconnectScheduled {
        delay: Duration,
        retry_count: u32,
    },
    /// A submit was ignored; nothing changed
    SubmitRejected {
        reason: TransitionError,
    },
}

/// Handle to interact with a running session
///
/// Dropping the handle deactivates the session.
pub struct SessionHandle {
    session_id: String,
    event_tx: mpsc::Sender<Event>,
    status_rx: watch::Receiver<SessionStatus>,
    updates_tx: broadcast::Sender<SessionUpdate>,
    transcript: Arc<RwLock<TranscriptStore>>,
    join: JoinHandle<()>,
    _shutdown: DropGuard,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Submit user text as a new turn.
    ///
    /// Empty text, a closed connection or a turn already in flight make this
    /// a no-op, reported only as [`SessionUpdate::SubmitRejected`].
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send_event(Event::Submit { text: text.into() }).await
    }

    /// Clear a turn left waiting after a connection drop
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.send_event(Event::Reset).await
    }

    pub fn status(&self) -> SessionStatus {
        *self.status_rx.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates_tx.subscribe()
    }

    /// Updates as a stream, skipping any an observer lagged behind on
    pub fn updates(&self) -> impl Stream<Item = SessionUpdate> {
        BroadcastStream::new(self.updates_tx.subscribe()).filter_map(Result::ok)
    }

    /// Current transcript, oldest first
    pub async fn transcript(&self) -> Vec<Message> {
        self.transcript.read().await.snapshot().to_vec()
    }

    /// Close the connection, cancel pending reconnects and wait for the
    /// event loop to stop
    pub async fn deactivate(self) {
        if self.event_tx.send(Event::Deactivate).await.is_err() {
            tracing::debug!(session_id = %self.session_id, "Session already stopped");
        }
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "Session task failed");
        }
    }

    async fn send_event(&self, event: Event) -> Result<(), SessionError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// Seed a transcript and spawn the session loop on the current runtime
pub fn start<T, D>(
    context: SessionContext,
    history: Vec<PersistedMessage>,
    transport: T,
    dispatcher: D,
) -> Result<SessionHandle, SessionError>
where
    T: Transport + 'static,
    D: InvalidationDispatcher + 'static,
{
    let mut transcript = TranscriptStore::new();
    transcript.seed(history)?;
    let transcript = Arc::new(RwLock::new(transcript));

    let (event_tx, event_rx) = mpsc::channel(32);
    let (updates_tx, _) = broadcast::channel(128);
    let (status_tx, status_rx) = watch::channel(SessionStatus::default());
    let shutdown = CancellationToken::new();

    let session_id = context.session_id.clone();
    let runtime = SessionRuntime::new(
        context,
        transport,
        dispatcher,
        transcript.clone(),
        event_rx,
        event_tx.clone(),
        updates_tx.clone(),
        status_tx,
        shutdown.clone(),
    );
    let join = tokio::spawn(runtime.run());

    Ok(SessionHandle {
        session_id,
        event_tx,
        status_rx,
        updates_tx,
        transcript,
        join,
        _shutdown: shutdown.drop_guard(),
    })
}

/// Fetch the day's history, then start a session over the given transport
pub async fn activate_with<T, H, D>(
    context: SessionContext,
    date: NaiveDate,
    history: &H,
    transport: T,
    dispatcher: D,
) -> Result<SessionHandle, SessionError>
where
    T: Transport + 'static,
    H: HistorySource + ?Sized,
    D: InvalidationDispatcher + 'static,
{
    let messages = history.messages_for_date(date).await?;
    tracing::info!(
        session_id = %context.session_id,
        date = %date,
        count = messages.len(),
        "Loaded chat history"
    );
    start(context, messages, transport, dispatcher)
}

/// Activate a production session against the configured backend
pub async fn activate<D>(
    config: &SessionConfig,
    date: NaiveDate,
    dispatcher: D,
) -> Result<SessionHandle, SessionError>
where
    D: InvalidationDispatcher + 'static,
{
    let history = HttpHistorySource::new(config)?;
    let transport = WebSocketTransport::new(config);
    activate_with(config.session_context(), date, &history, transport, dispatcher).await
}
