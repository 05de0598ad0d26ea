//! Deterministic item model shared by the authority and its clients.
//!
//! The crate holds no I/O and no async code: it defines item records, the
//! stores that own them, and the replicated commands that mutate them.
//!
//! Modules:
//! - [`array`]: indexed record arena with per-record delta replication
//! - [`store`]: the [`ItemsStore`] facade (stacking, slots, attachments,
//!   prediction locks) and [`ItemsStores`]
//! - [`command`]: the [`ReplicatedCommand`] contract and built-in commands
//! - [`stack`]: stacking policies referenced by definitions
//! - [`definition`], [`spec`], [`data`]: templates, creation requests, records
pub mod array;
pub mod command;
pub mod config;
pub mod data;
pub mod definition;
pub mod error;
pub mod id;
pub mod spec;
pub mod stack;
pub mod store;
pub mod tag;

pub use array::{ItemsArray, ItemsDelta, ReplicationError, ReplicationNotify};
pub use command::{
    AttachItem, CommandError, CommandOutcome, DetachItem, DropItem, EquipItem, EquipNewItem,
    ExpectedVersion, MoveItemBetweenStores, MoveItemToSlot, RemoveItemFromSlot,
    ReplicatedCommand, TaggedCommand, VersionGuard,
};
pub use config::StoreConfig;
pub use data::ItemData;
pub use definition::{DefinitionId, DefinitionOracle, ItemDefinition, SocketSlot};
pub use error::{ErrorContext, ErrorSeverity, ItemsError};
pub use id::{ItemId, StoreId};
pub use spec::ItemSpec;
pub use stack::{ScalableStacks, StackMethod, StackOutcome, StackPolicy};
pub use store::{
    AttachmentCopy, ItemCopyContainer, ItemsStore, ItemsStores, NetRole, PredictionLocks,
    StoreError, StoreEvent,
};
pub use tag::{GameplayTag, TagContainer, TagError};
