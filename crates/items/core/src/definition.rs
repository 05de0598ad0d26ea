//! Static item templates and the oracle that resolves them.

use std::fmt;

use crate::stack::StackMethod;
use crate::tag::{GameplayTag, TagContainer};

/// Stable identifier of an item definition (the template's primary id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DefinitionId(String);

impl DefinitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DefinitionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Attach point an owner item exposes to other items.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SocketSlot {
    pub slot: GameplayTag,
    /// Created and attached automatically when the owner is added to a store.
    #[cfg_attr(feature = "serde", serde(default))]
    pub default_attachment: Option<DefinitionId>,
}

impl SocketSlot {
    pub fn new(slot: GameplayTag) -> Self {
        Self {
            slot,
            default_attachment: None,
        }
    }

    pub fn with_default(mut self, definition: DefinitionId) -> Self {
        self.default_attachment = Some(definition);
        self
    }
}

/// Shared, read-only template describing an item kind.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemDefinition {
    pub id: DefinitionId,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub stack_method: StackMethod,
    #[cfg_attr(feature = "serde", serde(default))]
    pub socket_slots: Vec<SocketSlot>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: TagContainer,
    #[cfg_attr(feature = "serde", serde(default))]
    pub droppable: bool,
}

impl ItemDefinition {
    pub fn new(id: impl Into<DefinitionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stack_method: StackMethod::default(),
            socket_slots: Vec::new(),
            tags: TagContainer::new(),
            droppable: false,
        }
    }

    pub fn with_stack_method(mut self, stack_method: StackMethod) -> Self {
        self.stack_method = stack_method;
        self
    }

    pub fn with_socket(mut self, socket: SocketSlot) -> Self {
        self.socket_slots.push(socket);
        self
    }

    pub fn with_tag(mut self, tag: GameplayTag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn droppable(mut self) -> Self {
        self.droppable = true;
        self
    }

    pub fn socket(&self, slot: &GameplayTag) -> Option<&SocketSlot> {
        self.socket_slots.iter().find(|socket| &socket.slot == slot)
    }

    pub fn declares_socket(&self, slot: &GameplayTag) -> bool {
        self.socket(slot).is_some()
    }
}

/// Resolves definition ids to templates.
///
/// Injected into every store; there is no global asset registry.
pub trait DefinitionOracle: Send + Sync {
    fn definition(&self, id: &DefinitionId) -> Option<&ItemDefinition>;

    fn all_definitions(&self) -> Vec<&ItemDefinition>;
}
