//! Cache invalidation topics and dispatcher adapters
//!
//! A completed turn may have changed any of the user's records on the backend,
//! so the session tells dependent caches which topics to refetch.

use crate::runtime::InvalidationDispatcher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tokio::sync::mpsc;

/// A cache key family that a completed turn may have made stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Checkin,
    Todos,
    Mantras,
    Gratitude,
    Daily,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Checkin,
        Topic::Todos,
        Topic::Mantras,
        Topic::Gratitude,
        Topic::Daily,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Checkin => "checkin",
            Topic::Todos => "todos",
            Topic::Mantras => "mantras",
            Topic::Gratitude => "gratitude",
            Topic::Daily => "daily",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type TopicSet = BTreeSet<Topic>;

/// Topics invalidated after every completed turn
pub fn turn_complete_topics() -> TopicSet {
    Topic::ALL.into_iter().collect()
}

pub(crate) fn topic_list(topics: &TopicSet) -> String {
    topics
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Forwards topic sets to a channel so a host can refresh caches on its own task
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<TopicSet>,
}

impl ChannelDispatcher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TopicSet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl InvalidationDispatcher for ChannelDispatcher {
    fn invalidate(&self, topics: &TopicSet) {
        if self.tx.send(topics.clone()).is_err() {
            tracing::debug!("Invalidation receiver dropped");
        }
    }
}

/// Logging wrapper for invalidation dispatchers
pub struct LoggingDispatcher<D> {
    inner: D,
}

impl<D: InvalidationDispatcher> LoggingDispatcher<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

impl<D: InvalidationDispatcher> InvalidationDispatcher for LoggingDispatcher<D> {
    fn invalidate(&self, topics: &TopicSet) {
        tracing::info!(topics = %topic_list(topics), "Invalidating caches");
        self.inner.invalidate(topics);
    }
}
