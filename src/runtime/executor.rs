//! Session runtime executor
//!
//! Owns the session state and runs the single event loop: every connection
//! event, timer firing and user action arrives on one channel, goes through
//! the pure transition function, and the resulting effects are executed here.

use super::traits::{Connection, InvalidationDispatcher, Transport};
use super::SessionUpdate;
use crate::invalidation::topic_list;
use crate::session::{
    transition, ConnectionState, Effect, Event, Generation, Ignored, SessionContext,
    SessionState, SessionStatus,
};
use crate::transcript::{Message, TranscriptStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// The physical connection currently owned by the session
struct ActiveConnection {
    generation: Generation,
    outbound_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

/// Generic session runtime that can work with any transport and dispatcher
pub struct SessionRuntime<T, D>
where
    T: Transport + 'static,
    D: InvalidationDispatcher + 'static,
{
    context: SessionContext,
    state: SessionState,
    transport: Arc<T>,
    dispatcher: D,
    transcript: Arc<RwLock<TranscriptStore>>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    updates_tx: broadcast::Sender<SessionUpdate>,
    status_tx: watch::Sender<SessionStatus>,
    /// Cancelled when the owning handle is dropped
    shutdown: CancellationToken,
    active: Option<ActiveConnection>,
    /// Token to cancel the pending reconnect timer
    reconnect_timer: Option<CancellationToken>,
    /// Set by `Effect::Stop`; the loop exits once the current event is done
    stopping: bool,
}

impl<T, D> SessionRuntime<T, D>
where
    T: Transport + 'static,
    D: InvalidationDispatcher + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: SessionContext,
        transport: T,
        dispatcher: D,
        transcript: Arc<RwLock<TranscriptStore>>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        updates_tx: broadcast::Sender<SessionUpdate>,
        status_tx: watch::Sender<SessionStatus>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            context,
            state: SessionState::new(),
            transport: Arc::new(transport),
            dispatcher,
            transcript,
            event_rx,
            event_tx,
            updates_tx,
            status_tx,
            shutdown,
            active: None,
            reconnect_timer: None,
            stopping: false,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting chat session");

        self.process_event(Event::Activate).await;

        // Process events in a loop until an effect stops it
        while !self.stopping {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    self.process_event(Event::Deactivate).await;
                }
                Some(event) = self.event_rx.recv() => {
                    self.process_event(event).await;
                }
                else => break,
            }
        }

        tracing::info!(session_id = %self.context.session_id, "Chat session stopped");
    }

    async fn process_event(&mut self, event: Event) {
        let event_name = event.name();
        let event_generation = event.generation();

        // Pure state transition
        let result = match transition(&self.state, &self.context, event) {
            Ok(r) => r,
            Err(reason) => {
                // Rejected submits change nothing; observers may show the reason
                tracing::debug!(reason = %reason, "Submit rejected");
                let _ = self.updates_tx.send(SessionUpdate::SubmitRejected { reason });
                return;
            }
        };

        match result.ignored {
            Some(Ignored::Stale) => {
                tracing::trace!(
                    event = event_name,
                    event_generation = ?event_generation,
                    generation = self.state.generation,
                    "Dropping stale event"
                );
                return;
            }
            Some(Ignored::UnrecognizedFrame) => {
                tracing::debug!(generation = self.state.generation, "Ignoring unrecognized frame");
                return;
            }
            Some(Ignored::NotApplicable) => {
                tracing::debug!(
                    event = event_name,
                    state = self.state.connection.as_str(),
                    "Event not applicable in current state"
                );
                return;
            }
            None => {}
        }

        let old_state = std::mem::replace(&mut self.state, result.new_state);
        if old_state.connection != self.state.connection {
            self.log_connection_change(&old_state);
            let _ = self.updates_tx.send(SessionUpdate::StateChanged {
                connection: self.state.connection,
            });
        }

        for effect in result.effects {
            self.execute_effect(effect).await;
        }

        self.publish_status();
    }

    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Connect { generation } => self.connect(generation),

            Effect::Send { generation, frame } => {
                let Some(active) = self
                    .active
                    .as_ref()
                    .filter(|a| a.generation == generation)
                else {
                    tracing::debug!(generation, "No open connection, dropping send");
                    return;
                };
                if self.state.connection != ConnectionState::Open {
                    tracing::debug!(generation, "Connection not open, dropping send");
                    return;
                }
                match frame.to_json() {
                    Ok(json) => {
                        if active.outbound_tx.send(json).is_err() {
                            tracing::debug!(generation, "Connection task gone, dropping send");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to encode frame"),
                }
            }

            Effect::CloseConnection => {
                if let Some(active) = self.active.take() {
                    tracing::debug!(generation = active.generation, "Releasing connection");
                    active.cancel.cancel();
                }
            }

            Effect::ScheduleReconnect {
                generation,
                delay,
                retry_count,
            } => {
                self.schedule_reconnect(generation, delay);
                tracing::info!(
                    generation,
                    retry_count,
                    delay_ms = delay.as_millis(),
                    "Reconnect scheduled"
                );
                let _ = self
                    .updates_tx
                    .send(SessionUpdate::ReconnectScheduled { delay, retry_count });
            }

            Effect::CancelReconnect => {
                if let Some(timer) = self.reconnect_timer.take() {
                    timer.cancel();
                }
            }

            Effect::AppendMessage(message) => self.append(message).await,

            Effect::Invalidate(topics) => {
                tracing::debug!(topics = %topic_list(&topics), "Turn complete, invalidating");
                self.dispatcher.invalidate(&topics);
                let _ = self.updates_tx.send(SessionUpdate::Invalidated { topics });
            }

            Effect::Stop => {
                tracing::info!(session_id = %self.context.session_id, "Deactivating chat session");
                self.stopping = true;
                self.event_rx.close();
            }
        }
    }

    async fn append(&self, message: Message) {
        self.transcript.write().await.append(message.clone());
        let _ = self
            .updates_tx
            .send(SessionUpdate::MessageAppended { message });
    }

    /// Spawn the task that owns the physical connection of `generation`
    fn connect(&mut self, generation: Generation) {
        if let Some(previous) = self.active.take() {
            previous.cancel.cancel();
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = self.shutdown.child_token();

        tracing::debug!(generation, "Opening connection");
        tokio::spawn(drive_connection(
            self.transport.clone(),
            generation,
            self.event_tx.clone(),
            outbound_rx,
            cancel.clone(),
        ));

        self.active = Some(ActiveConnection {
            generation,
            outbound_tx,
            cancel,
        });
    }

    fn schedule_reconnect(&mut self, generation: Generation, delay: Duration) {
        if let Some(previous) = self.reconnect_timer.take() {
            previous.cancel();
        }

        let timer = self.shutdown.child_token();
        let cancelled = timer.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = event_tx.send(Event::ReconnectDue { generation }).await;
                }
            }
        });

        self.reconnect_timer = Some(timer);
    }

    fn log_connection_change(&self, old_state: &SessionState) {
        match self.state.connection {
            ConnectionState::Open => tracing::info!(
                generation = self.state.generation,
                "Connected to chat endpoint"
            ),
            ConnectionState::Closed if !self.state.deactivated => tracing::warn!(
                generation = old_state.generation,
                retry_count = self.state.retry_count,
                waiting = self.state.waiting,
                "Chat connection lost"
            ),
            _ => tracing::debug!(
                from = old_state.connection.as_str(),
                to = self.state.connection.as_str(),
                generation = self.state.generation,
                "Connection state changed"
            ),
        }
    }

    fn publish_status(&self) {
        let status = self.state.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

/// Own one physical connection: handshake, pump frames both ways, and report
/// exactly one terminal event unless cancelled first.
async fn drive_connection<T: Transport + ?Sized>(
    transport: Arc<T>,
    generation: Generation,
    event_tx: mpsc::Sender<Event>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let mut conn: Box<dyn Connection> = tokio::select! {
        () = cancel.cancelled() => return,
        result = transport.connect() => match result {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(generation, error = %e, "Connection attempt failed");
                let _ = event_tx
                    .send(Event::Errored { generation, message: e.to_string() })
                    .await;
                return;
            }
        },
    };

    if event_tx.send(Event::Opened { generation }).await.is_err() {
        conn.close().await;
        return;
    }

    let terminal = loop {
        tokio::select! {
            () = cancel.cancelled() => {
                conn.close().await;
                return;
            }
            Some(text) = outbound_rx.recv() => {
                if let Err(e) = conn.send(text).await {
                    tracing::warn!(generation, error = %e, "Send failed");
                    break Event::Errored { generation, message: e.to_string() };
                }
            }
            inbound = conn.recv() => match inbound {
                Some(Ok(text)) => {
                    if event_tx.send(Event::Frame { generation, text }).await.is_err() {
                        conn.close().await;
                        return;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(generation, error = %e, "Receive failed");
                    break Event::Errored { generation, message: e.to_string() };
                }
                None => {
                    tracing::debug!(generation, "Peer closed connection");
                    break Event::Closed { generation };
                }
            },
        }
    };

    conn.close().await;
    let _ = event_tx.send(terminal).await;
}
