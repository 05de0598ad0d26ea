//! Errors raised while validating or executing replicated commands.

use crate::definition::DefinitionId;
use crate::error::{ErrorContext, ErrorSeverity, ItemsError};
use crate::id::{ItemId, StoreId};
use crate::store::StoreError;
use crate::tag::GameplayTag;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("{store} is not registered")]
    UnknownStore { store: StoreId },

    #[error("item {item} not found in {store}")]
    ItemNotFound { store: StoreId, item: ItemId },

    #[error("item definition '{definition}' is not registered")]
    UnknownDefinition { definition: DefinitionId },

    #[error("item {item} is pending on another command")]
    ItemPending { item: ItemId },

    #[error("item {item} is locked by another command")]
    ItemLocked { item: ItemId },

    #[error("slot {slot} is locked by another command")]
    SlotLocked { slot: GameplayTag },

    #[error("attach slot {slot} on {owner} is locked by another command")]
    AttachmentSlotLocked { owner: ItemId, slot: GameplayTag },

    #[error("item {item} is already on slot {slot}")]
    AlreadyInSlot { item: ItemId, slot: GameplayTag },

    #[error("item {item} cannot be dropped")]
    NotDroppable { item: ItemId },

    #[error("source and target store are both {store}")]
    SameStore { store: StoreId },

    #[error("item {item} changed since the command was sent (expected v{expected}, found {actual:?})")]
    StaleVersion {
        store: StoreId,
        item: ItemId,
        expected: u32,
        /// `None` when the item no longer exists.
        actual: Option<u32>,
    },

    #[error("{source}")]
    Store {
        source: StoreError,
        context: ErrorContext,
    },
}

impl CommandError {
    /// Wraps a store failure with the store it happened in.
    pub fn store(store: StoreId, source: StoreError) -> Self {
        Self::Store {
            source,
            context: ErrorContext::new().with_store(store),
        }
    }

    /// Wraps a store failure concerning a specific item.
    pub fn store_item(store: StoreId, item: ItemId, source: StoreError) -> Self {
        Self::Store {
            source,
            context: ErrorContext::new().with_store(store).with_item(item),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleVersion { .. })
    }
}

impl ItemsError for CommandError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ItemPending { .. }
            | Self::ItemLocked { .. }
            | Self::SlotLocked { .. }
            | Self::AttachmentSlotLocked { .. }
            | Self::StaleVersion { .. } => ErrorSeverity::Recoverable,
            Self::Store { source, .. } => source.severity(),
            _ => ErrorSeverity::Validation,
        }
    }

    fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Store { context, .. } => Some(context),
            _ => None,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownStore { .. } => "COMMAND_UNKNOWN_STORE",
            Self::ItemNotFound { .. } => "COMMAND_ITEM_NOT_FOUND",
            Self::UnknownDefinition { .. } => "COMMAND_UNKNOWN_DEFINITION",
            Self::ItemPending { .. } => "COMMAND_ITEM_PENDING",
            Self::ItemLocked { .. } => "COMMAND_ITEM_LOCKED",
            Self::SlotLocked { .. } => "COMMAND_SLOT_LOCKED",
            Self::AttachmentSlotLocked { .. } => "COMMAND_ATTACHMENT_SLOT_LOCKED",
            Self::AlreadyInSlot { .. } => "COMMAND_ALREADY_IN_SLOT",
            Self::NotDroppable { .. } => "COMMAND_NOT_DROPPABLE",
            Self::SameStore { .. } => "COMMAND_SAME_STORE",
            Self::StaleVersion { .. } => "COMMAND_STALE_VERSION",
            Self::Store { source, .. } => source.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_code_and_gain_context() {
        let item = ItemId::generate();
        let error = CommandError::store_item(StoreId(2), item, StoreError::NotOnSlot { item });

        assert_eq!(error.error_code(), "STORE_NOT_ON_SLOT");
        assert_eq!(error.severity(), ErrorSeverity::Validation);
        let context = error.context().unwrap();
        assert_eq!(context.store, Some(StoreId(2)));
        assert_eq!(context.item, Some(item));
    }

    #[test]
    fn stale_versions_are_recoverable() {
        let error = CommandError::StaleVersion {
            store: StoreId(1),
            item: ItemId::generate(),
            expected: 3,
            actual: Some(4),
        };
        assert!(error.is_stale());
        assert!(error.severity().is_recoverable());
        assert!(error.context().is_none());
    }
}
