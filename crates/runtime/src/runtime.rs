//! High-level runtime orchestrator.
//!
//! The runtime owns the authority worker, wires up command/event channels, and
//! exposes a builder-based API for hosting item stores and connecting clients.

use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use items_core::{DefinitionOracle, ItemsStore, ItemsStores, StoreConfig, StoreId};

use crate::api::{ClientSession, CommandRegistry, Result, RuntimeError, RuntimeHandle};
use crate::events::{Event, EventBus, Topic};
use crate::repository::StoreRepository;
use crate::workers::{AuthorityWorker, Command};

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub command_buffer_size: usize,
    pub event_buffer_size: usize,
    /// In-flight commands older than this are rolled back by the client.
    pub command_timeout: Duration,
    pub save_dir: PathBuf,
    pub store: StoreConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            event_buffer_size: 100,
            command_timeout: Duration::from_secs(5),
            save_dir: default_save_dir(),
            store: StoreConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `ITEMS_COMMAND_BUFFER` - Submission queue size (default: 32)
    /// - `ITEMS_EVENT_BUFFER` - Per-topic event capacity (default: 100)
    /// - `ITEMS_COMMAND_TIMEOUT_MS` - In-flight command timeout (default: 5000)
    /// - `ITEMS_SAVE_DIR` - Directory for store snapshots (default: platform-specific)
    /// - `ITEMS_TOMBSTONE_RETENTION` - Replication keys of removal history kept (default: 1024)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(capacity) = parse::<usize>(lookup("ITEMS_COMMAND_BUFFER")) {
            config.command_buffer_size = capacity.max(1);
        }

        if let Some(capacity) = parse::<usize>(lookup("ITEMS_EVENT_BUFFER")) {
            config.event_buffer_size = capacity.max(1);
        }

        if let Some(millis) = parse::<u64>(lookup("ITEMS_COMMAND_TIMEOUT_MS")) {
            config.command_timeout = Duration::from_millis(millis.max(1));
        }

        if let Some(dir) = lookup("ITEMS_SAVE_DIR").filter(|dir| !dir.is_empty()) {
            config.save_dir = PathBuf::from(dir);
        }

        if let Some(retention) = parse::<u64>(lookup("ITEMS_TOMBSTONE_RETENTION")) {
            config.store.tombstone_retention = retention;
        }

        config
    }
}

fn parse<T>(value: Option<String>) -> Option<T>
where
    T: std::str::FromStr,
{
    value?.trim().parse().ok()
}

/// Platform data directory for store snapshots, or `./save_data`.
pub fn default_save_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "items")
        .map(|dirs| dirs.data_dir().join("stores"))
        .unwrap_or_else(|| PathBuf::from("./save_data"))
}

/// Main runtime that hosts the authoritative item stores
///
/// Design: Runtime owns the authority worker.
/// [`RuntimeHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    handle: RuntimeHandle,
    worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Connect a client session
    pub async fn connect(&self) -> Result<ClientSession> {
        self.handle.connect().await
    }

    /// Subscribe to events from a topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.handle.subscribe(topic)
    }

    /// Shutdown the runtime gracefully
    ///
    /// The worker stops once every clone of the handle is dropped.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);

        self.worker_handle.await.map_err(RuntimeError::WorkerJoin)?;

        Ok(())
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    definitions: Option<Arc<dyn DefinitionOracle>>,
    stores: BTreeSet<StoreId>,
    registry: Option<CommandRegistry>,
    repository: Option<Arc<dyn StoreRepository>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            definitions: None,
            stores: BTreeSet::new(),
            registry: None,
            repository: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set required item definitions
    pub fn definitions(mut self, definitions: Arc<dyn DefinitionOracle>) -> Self {
        self.definitions = Some(definitions);
        self
    }

    /// Host a store with this id
    pub fn store(mut self, store: StoreId) -> Self {
        self.stores.insert(store);
        self
    }

    pub fn stores(mut self, stores: impl IntoIterator<Item = StoreId>) -> Self {
        self.stores.extend(stores);
        self
    }

    /// Replace the command registry
    ///
    /// If not provided, [`CommandRegistry::with_builtin_commands`] is used.
    pub fn registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Persist stores through `repository`; saved snapshots are restored on build
    pub fn repository(mut self, repository: Arc<dyn StoreRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Build the runtime
    pub async fn build(self) -> Result<Runtime> {
        let definitions = self.definitions.ok_or(RuntimeError::MissingDefinitions)?;

        let mut stores: ItemsStores = self
            .stores
            .iter()
            .map(|&store| ItemsStore::authority(store, Arc::clone(&definitions)))
            .collect();

        if let Some(repository) = &self.repository {
            for store in stores.iter_mut() {
                if let Some(snapshot) = repository.load(store.id())? {
                    let restored = snapshot.restore_into(store)?;
                    tracing::info!(store = %store.id(), restored, "store restored");
                }
            }
            // Restored contents are the starting point, not observable changes.
            stores.drain_events();
        }

        let (command_tx, command_rx) = mpsc::channel::<Command>(self.config.command_buffer_size);
        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.command_buffer_size);
        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);

        let handle = RuntimeHandle::new(
            command_tx,
            inbound_tx,
            event_bus.clone(),
            Arc::clone(&definitions),
            self.config.command_timeout,
        );

        let worker = AuthorityWorker::new(
            stores,
            self.registry
                .unwrap_or_else(CommandRegistry::with_builtin_commands),
            command_rx,
            inbound_rx,
            event_bus,
            self.config.store.clone(),
            self.repository,
        );

        let worker_handle = tokio::spawn(async move {
            worker.run().await;
        });

        Ok(Runtime {
            handle,
            worker_handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn reads_and_clamps_variables() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("ITEMS_COMMAND_BUFFER", "0"),
            ("ITEMS_EVENT_BUFFER", "256"),
            ("ITEMS_COMMAND_TIMEOUT_MS", "250"),
            ("ITEMS_SAVE_DIR", "/tmp/items-test"),
            ("ITEMS_TOMBSTONE_RETENTION", "16"),
        ]));

        assert_eq!(config.command_buffer_size, 1);
        assert_eq!(config.event_buffer_size, 256);
        assert_eq!(config.command_timeout, Duration::from_millis(250));
        assert_eq!(config.save_dir, PathBuf::from("/tmp/items-test"));
        assert_eq!(config.store.tombstone_retention, 16);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("ITEMS_COMMAND_BUFFER", "many"),
            ("ITEMS_COMMAND_TIMEOUT_MS", "-3"),
        ]));
        let defaults = RuntimeConfig::default();

        assert_eq!(config.command_buffer_size, defaults.command_buffer_size);
        assert_eq!(config.command_timeout, defaults.command_timeout);
        assert_eq!(
            config.store.tombstone_retention,
            StoreConfig::DEFAULT_TOMBSTONE_RETENTION
        );
    }

    #[tokio::test]
    async fn build_requires_definitions() {
        let result = Runtime::builder().store(StoreId(1)).build().await;
        assert!(matches!(result, Err(RuntimeError::MissingDefinitions)));
    }
}
