//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use super::error::{HistoryError, TransportError};
use crate::invalidation::TopicSet;
use crate::transcript::PersistedMessage;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Opens physical connections to the chat endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the handshake for a new physical connection
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError>;
}

/// One physical, already-open connection
#[async_trait]
pub trait Connection: Send {
    /// Send a text frame
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound text frame. `None` once the peer has closed.
    ///
    /// Must be cancel safe: the runtime races it against outbound sends.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection, best effort
    async fn close(&mut self);
}

/// Source of persisted chat history
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Messages persisted on `date`, oldest first
    async fn messages_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<PersistedMessage>, HistoryError>;
}

/// Receives cache topics to refresh after a completed turn
pub trait InvalidationDispatcher: Send + Sync {
    fn invalidate(&self, topics: &TopicSet);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        (**self).connect().await
    }
}

#[async_trait]
impl<T: HistorySource + ?Sized> HistorySource for Arc<T> {
    async fn messages_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<PersistedMessage>, HistoryError> {
        (**self).messages_for_date(date).await
    }
}

impl<T: InvalidationDispatcher + ?Sized> InvalidationDispatcher for Arc<T> {
    fn invalidate(&self, topics: &TopicSet) {
        (**self).invalidate(topics);
    }
}
