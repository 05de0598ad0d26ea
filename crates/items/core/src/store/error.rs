//! Errors raised by [`super::ItemsStore`] mutations.
//!
//! Every error leaves the store exactly as it was before the call.

use crate::array::ReplicationError;
use crate::definition::DefinitionId;
use crate::error::{ErrorSeverity, ItemsError};
use crate::id::{ItemId, StoreId};
use crate::tag::GameplayTag;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{store} is a client replica and cannot be mutated directly")]
    NotAuthority { store: StoreId },

    #[error("{store} is the authority and does not accept replicated deltas")]
    NotReplica { store: StoreId },

    #[error("item definition '{definition}' is not registered")]
    UnknownDefinition { definition: DefinitionId },

    #[error("item {item} not found")]
    ItemNotFound { item: ItemId },

    #[error("item {item} already exists in this store")]
    AlreadyExists { item: ItemId },

    #[error("stack method of '{definition}' refuses another item")]
    CannotAdd { definition: DefinitionId },

    #[error("item amount must be at least one")]
    InvalidAmount,

    #[error("item {item} is attached to another item and cannot use standalone slot {slot}")]
    AttachedItemCannotUseSlot { item: ItemId, slot: GameplayTag },

    #[error("slot {slot} is occupied by {occupant}")]
    SlotOccupied { slot: GameplayTag, occupant: ItemId },

    #[error("item {item} is not on any slot")]
    NotOnSlot { item: ItemId },

    #[error("slot {slot} is empty")]
    SlotEmpty { slot: GameplayTag },

    #[error("item {owner} does not declare attach slot {slot}")]
    SocketNotDeclared { owner: ItemId, slot: GameplayTag },

    #[error("attach slot {slot} on {owner} is occupied by {occupant}")]
    AttachmentSlotOccupied {
        owner: ItemId,
        slot: GameplayTag,
        occupant: ItemId,
    },

    #[error("attaching {attachment} under {owner} would create a cycle")]
    AttachmentCycle { owner: ItemId, attachment: ItemId },

    #[error("attachment chain under {owner} exceeds depth {max_depth}")]
    AttachmentTooDeep { owner: ItemId, max_depth: usize },

    #[error("item {item} is not attached to anything")]
    NotAttached { item: ItemId },

    #[error("nothing is attached to {owner} on {slot}")]
    NothingAttached { owner: ItemId, slot: GameplayTag },

    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

impl ItemsError for StoreError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::SlotOccupied { .. }
            | Self::AttachmentSlotOccupied { .. }
            | Self::Replication(_) => ErrorSeverity::Recoverable,
            Self::NotAuthority { .. } | Self::NotReplica { .. } => ErrorSeverity::Internal,
            _ => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotAuthority { .. } => "STORE_NOT_AUTHORITY",
            Self::NotReplica { .. } => "STORE_NOT_REPLICA",
            Self::UnknownDefinition { .. } => "STORE_UNKNOWN_DEFINITION",
            Self::ItemNotFound { .. } => "STORE_ITEM_NOT_FOUND",
            Self::AlreadyExists { .. } => "STORE_ALREADY_EXISTS",
            Self::CannotAdd { .. } => "STORE_CANNOT_ADD",
            Self::InvalidAmount => "STORE_INVALID_AMOUNT",
            Self::AttachedItemCannotUseSlot { .. } => "STORE_ATTACHED_ITEM_SLOT",
            Self::SlotOccupied { .. } => "STORE_SLOT_OCCUPIED",
            Self::NotOnSlot { .. } => "STORE_NOT_ON_SLOT",
            Self::SlotEmpty { .. } => "STORE_SLOT_EMPTY",
            Self::SocketNotDeclared { .. } => "STORE_SOCKET_NOT_DECLARED",
            Self::AttachmentSlotOccupied { .. } => "STORE_ATTACHMENT_SLOT_OCCUPIED",
            Self::AttachmentCycle { .. } => "STORE_ATTACHMENT_CYCLE",
            Self::AttachmentTooDeep { .. } => "STORE_ATTACHMENT_TOO_DEEP",
            Self::NotAttached { .. } => "STORE_NOT_ATTACHED",
            Self::NothingAttached { .. } => "STORE_NOTHING_ATTACHED",
            Self::Replication(error) => error.error_code(),
        }
    }
}
