//! Topic-based event bus implementation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::{CommandEvent, ReplicationEvent, StoreChange};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Store mutations on the authority and on replicas
    Store,
    /// Command lifecycle (sent, executed, rejected, confirmed, timed out)
    Command,
    /// Replication traffic
    Replication,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Store, Topic::Command, Topic::Replication];
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Store(StoreChange),
    Command(CommandEvent),
    Replication(ReplicationEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Store(_) => Topic::Store,
            Event::Command(_) => Topic::Command,
            Event::Replication(_) => Topic::Replication,
        }
    }
}

/// One sender per topic. The set of topics is fixed at construction.
struct Channels {
    store: broadcast::Sender<Event>,
    command: broadcast::Sender<Event>,
    replication: broadcast::Sender<Event>,
}

impl Channels {
    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Store => &self.store,
            Topic::Command => &self.command,
            Topic::Replication => &self.replication,
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<Channels>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channels: Arc::new(Channels {
                store: broadcast::channel(capacity).0,
                command: broadcast::channel(capacity).0,
                replication: broadcast::channel(capacity).0,
            }),
        }
    }

    /// Publish an event to its corresponding topic
    ///
    /// Events are best-effort: with no subscriber the event is dropped.
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.channels.sender(topic).send(event).is_err() {
            tracing::trace!("No subscribers for topic {:?}", topic);
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns a receiver that will only receive events for that topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.channels.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    ///
    /// Returns receivers for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}
