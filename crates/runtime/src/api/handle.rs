//! Cloneable façade for issuing commands to the runtime.
//!
//! [`RuntimeHandle`] hides channel plumbing and offers async helpers for
//! connecting client sessions, granting items on the authority and streaming
//! events from specific topics.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};

use items_core::{DefinitionOracle, ItemId, ItemSpec, ItemsStore, ItemsStores, StoreId};

use super::errors::{Result, RuntimeError};
use super::session::ClientSession;
use super::wire::{ClientId, ClientMessage};
use crate::events::{Event, EventBus, Topic};
use crate::repository::StoreSnapshot;
use crate::workers::Command;

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    inbound_tx: mpsc::Sender<(ClientId, ClientMessage)>,
    event_bus: EventBus,
    definitions: Arc<dyn DefinitionOracle>,
    command_timeout: Duration,
}

impl RuntimeHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<Command>,
        inbound_tx: mpsc::Sender<(ClientId, ClientMessage)>,
        event_bus: EventBus,
        definitions: Arc<dyn DefinitionOracle>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            command_tx,
            inbound_tx,
            event_bus,
            definitions,
            command_timeout,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Connect a new client session with a replica of every store.
    ///
    /// The returned session has already applied the initial full replicas.
    pub async fn connect(&self) -> Result<ClientSession> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let connected = self
            .request(|reply| Command::Connect {
                outbound: outbound_tx,
                reply,
            })
            .await?;

        let stores: ItemsStores = connected
            .stores
            .iter()
            .map(|&store| ItemsStore::client(store, Arc::clone(&self.definitions)))
            .collect();

        let mut session = ClientSession::new(
            connected.client,
            stores,
            self.inbound_tx.clone(),
            outbound_rx,
            self.command_timeout,
            self.event_bus.clone(),
        );
        session.poll()?;

        Ok(session)
    }

    /// Create an item directly on the authority and replicate it.
    pub async fn grant_item(&self, store: StoreId, spec: ItemSpec) -> Result<ItemId> {
        self.request(|reply| Command::GrantItem { store, spec, reply })
            .await?
    }

    /// Capture the authoritative contents of a store
    pub async fn snapshot(&self, store: StoreId) -> Result<StoreSnapshot> {
        self.request(|reply| Command::Snapshot { store, reply })
            .await?
    }

    /// Content digest of the authoritative store
    pub async fn digest(&self, store: StoreId) -> Result<[u8; 32]> {
        self.request(|reply| Command::Digest { store, reply })
            .await?
    }

    /// Persist every store through the configured repository
    ///
    /// Returns the number of stores saved.
    pub async fn save(&self) -> Result<usize> {
        self.request(|reply| Command::Save { reply }).await?
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Store` - Store mutations on the authority and on replicas
    /// - `Topic::Command` - Command lifecycle
    /// - `Topic::Replication` - Deltas sent and applied
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use items_runtime::Topic;
    ///
    /// let mut commands = handle.subscribe(Topic::Command);
    /// while let Ok(event) = commands.recv().await {
    ///     // Handle command lifecycle events
    /// }
    /// ```
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> std::collections::HashMap<Topic, broadcast::Receiver<Event>> {
        self.event_bus.subscribe_multiple(topics)
    }

    pub fn definitions(&self) -> &Arc<dyn DefinitionOracle> {
        &self.definitions
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}
