//! Command registry mapping wire tags to decoders.
//!
//! The authority never matches on a closed enum of command kinds: every kind
//! registers a decoder under its [`TaggedCommand::TAG`], and incoming
//! envelopes are resolved through this table.
//!
//! # Design
//!
//! - **Decoders**: plain function pointers, one monomorphized per command type
//! - **Extension**: downstream crates call [`CommandRegistry::register`] with
//!   their own command types
//! - **Unknown tags**: rejected with [`RuntimeError::UnknownCommandTag`]

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use items_core::{
    AttachItem, DetachItem, DropItem, EquipItem, EquipNewItem, MoveItemBetweenStores,
    MoveItemToSlot, RemoveItemFromSlot, ReplicatedCommand, TaggedCommand,
};

use super::errors::{Result, RuntimeError};
use super::wire::CommandEnvelope;

type Decoder = fn(&[u8]) -> std::result::Result<Box<dyn ReplicatedCommand>, bincode::Error>;

fn decode_as<C>(payload: &[u8]) -> std::result::Result<Box<dyn ReplicatedCommand>, bincode::Error>
where
    C: ReplicatedCommand + DeserializeOwned + 'static,
{
    let command: C = bincode::deserialize(payload)?;
    Ok(Box::new(command))
}

/// Registry of decodable command kinds.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in item command.
    pub fn with_builtin_commands() -> Self {
        let mut registry = Self::new();
        registry.register::<EquipItem>();
        registry.register::<EquipNewItem>();
        registry.register::<DropItem>();
        registry.register::<MoveItemBetweenStores>();
        registry.register::<MoveItemToSlot>();
        registry.register::<RemoveItemFromSlot>();
        registry.register::<AttachItem>();
        registry.register::<DetachItem>();
        registry
    }

    /// Register a command kind under its tag.
    ///
    /// Registering the same tag twice replaces the earlier decoder.
    pub fn register<C>(&mut self)
    where
        C: ReplicatedCommand + TaggedCommand + DeserializeOwned + 'static,
    {
        if self.decoders.insert(C::TAG, decode_as::<C>).is_some() {
            tracing::warn!(tag = C::TAG, "command decoder replaced");
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.decoders.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Decode an envelope into a command object.
    pub fn decode(&self, envelope: &CommandEnvelope) -> Result<Box<dyn ReplicatedCommand>> {
        let decoder =
            self.decoders
                .get(envelope.tag.as_str())
                .ok_or_else(|| RuntimeError::UnknownCommandTag {
                    tag: envelope.tag.clone(),
                })?;

        decoder(&envelope.payload).map_err(|e| RuntimeError::Decode {
            tag: envelope.tag.clone(),
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
