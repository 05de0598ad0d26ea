//! Runtime orchestration for replicated item stores.
//!
//! This crate wires the deterministic `items-core` model into an authority
//! worker, client sessions, repositories and an event bus. Consumers embed
//! [`Runtime`] to host the authoritative stores and connect
//! [`ClientSession`]s that predict, submit and confirm commands.
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator, builder and configuration
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides topic-based event bus for flexible event routing
//! - [`workers`] keeps background tasks internal to the crate
//! - [`oracle`] and [`repository`] provide content and persistence adapters
pub mod api;
pub mod events;
pub mod oracle;
pub mod repository;
pub mod runtime;

mod workers;

pub use api::{
    ClientId, ClientMessage, ClientSession, CommandEnvelope, CommandId, CommandRegistry,
    Confirmation, Result, RuntimeError, RuntimeHandle, ServerMessage,
};
pub use events::{CommandEvent, Event, EventBus, Origin, ReplicationEvent, StoreChange, Topic};
pub use oracle::{DefinitionCatalog, DefinitionOracleImpl, OracleError};
pub use repository::{
    FileStoreRepository, InMemoryStoreRepository, RepositoryError, StoreRepository, StoreSnapshot,
};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig, default_save_dir};
