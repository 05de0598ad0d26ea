//! Hierarchical gameplay tags used as slot, socket and item classification keys.
//!
//! A tag is a dotted path such as `Slot.Weapon.Primary`. Matching is
//! hierarchical: a tag matches itself and every ancestor path.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorSeverity, ItemsError};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("tag name is empty")]
    Empty,

    #[error("tag '{name}' has an empty segment")]
    EmptySegment { name: String },

    #[error("tag '{name}' contains invalid character '{ch}'")]
    InvalidCharacter { name: String, ch: char },
}

impl ItemsError for TagError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "TAG_EMPTY",
            Self::EmptySegment { .. } => "TAG_EMPTY_SEGMENT",
            Self::InvalidCharacter { .. } => "TAG_INVALID_CHARACTER",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct GameplayTag(String);

impl GameplayTag {
    pub fn new(name: impl Into<String>) -> Result<Self, TagError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TagError::Empty);
        }
        if name.split('.').any(str::is_empty) {
            return Err(TagError::EmptySegment { name });
        }
        if let Some(ch) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '.'))
        {
            return Err(TagError::InvalidCharacter { name, ch });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when `self` equals `parent` or lies beneath it.
    pub fn matches(&self, parent: &GameplayTag) -> bool {
        self.0 == parent.0
            || (self.0.len() > parent.0.len()
                && self.0.starts_with(parent.0.as_str())
                && self.0.as_bytes()[parent.0.len()] == b'.')
    }

    /// Direct parent path, if any.
    pub fn parent(&self) -> Option<GameplayTag> {
        self.0
            .rsplit_once('.')
            .map(|(parent, _)| GameplayTag(parent.to_owned()))
    }
}

impl fmt::Display for GameplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GameplayTag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for GameplayTag {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GameplayTag> for String {
    fn from(tag: GameplayTag) -> Self {
        tag.0
    }
}

/// Ordered set of tags with hierarchical queries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TagContainer {
    tags: BTreeSet<GameplayTag>,
}

impl TagContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the tag was not already present.
    pub fn insert(&mut self, tag: GameplayTag) -> bool {
        self.tags.insert(tag)
    }

    /// Returns true if the tag was present.
    pub fn remove(&mut self, tag: &GameplayTag) -> bool {
        self.tags.remove(tag)
    }

    pub fn contains_exact(&self, tag: &GameplayTag) -> bool {
        self.tags.contains(tag)
    }

    /// True if any contained tag matches `query` hierarchically.
    pub fn has_tag(&self, query: &GameplayTag) -> bool {
        self.tags.iter().any(|tag| tag.matches(query))
    }

    pub fn has_all(&self, query: &TagContainer) -> bool {
        query.tags.iter().all(|tag| self.has_tag(tag))
    }

    pub fn has_any(&self, query: &TagContainer) -> bool {
        query.tags.iter().any(|tag| self.has_tag(tag))
    }

    pub fn extend(&mut self, other: &TagContainer) {
        self.tags.extend(other.tags.iter().cloned());
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameplayTag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<GameplayTag> for TagContainer {
    fn from_iter<I: IntoIterator<Item = GameplayTag>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}
