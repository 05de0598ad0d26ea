//! [`DefinitionOracle`] backed by an in-memory map, loadable from RON.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use items_core::{DefinitionId, DefinitionOracle, ItemDefinition, StackMethod};

use super::OracleError;

/// Definition catalog structure for RON files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionCatalog {
    pub items: Vec<ItemDefinition>,
}

/// DefinitionOracle implementation with static item definitions
#[derive(Debug, Default)]
pub struct DefinitionOracleImpl {
    definitions: HashMap<DefinitionId, ItemDefinition>,
}

impl DefinitionOracleImpl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item definition, replacing any earlier one with the same id
    pub fn add_definition(&mut self, definition: ItemDefinition) {
        self.definitions.insert(definition.id.clone(), definition);
    }

    /// Build from a list, rejecting duplicates and malformed templates.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ItemDefinition>,
    ) -> Result<Self, OracleError> {
        let mut oracle = Self::new();
        for definition in definitions {
            validate(&definition)?;
            if oracle.definitions.contains_key(&definition.id) {
                return Err(OracleError::DuplicateDefinition {
                    id: definition.id.to_string(),
                });
            }
            oracle.add_definition(definition);
        }
        Ok(oracle)
    }

    /// Parse a `DefinitionCatalog` from RON text.
    pub fn from_ron_str(content: &str) -> Result<Self, OracleError> {
        let catalog: DefinitionCatalog =
            ron::from_str(content).map_err(|e| OracleError::Parse(e.to_string()))?;
        let oracle = Self::from_definitions(catalog.items)?;

        tracing::debug!(definitions = oracle.len(), "loaded item definitions");
        Ok(oracle)
    }

    /// Load a `DefinitionCatalog` from a RON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OracleError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&content)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn validate(definition: &ItemDefinition) -> Result<(), OracleError> {
    let invalid = |reason| OracleError::InvalidDefinition {
        id: definition.id.to_string(),
        reason,
    };

    if !definition.id.is_valid() {
        return Err(invalid("empty id"));
    }
    if let StackMethod::StackByType { max_stacks } = definition.stack_method
        && max_stacks.base == 0
    {
        return Err(invalid("stack cap must be at least 1"));
    }
    for (index, socket) in definition.socket_slots.iter().enumerate() {
        if definition.socket_slots[..index]
            .iter()
            .any(|other| other.slot == socket.slot)
        {
            return Err(invalid("socket declared twice"));
        }
    }
    Ok(())
}

impl DefinitionOracle for DefinitionOracleImpl {
    fn definition(&self, id: &DefinitionId) -> Option<&ItemDefinition> {
        self.definitions.get(id)
    }

    fn all_definitions(&self) -> Vec<&ItemDefinition> {
        let mut all: Vec<_> = self.definitions.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use items_core::{GameplayTag, ScalableStacks};

    const CATALOG: &str = r#"
        (
            items: [
                (
                    id: "arrow",
                    name: "Arrow",
                    stack_method: StackByType(max_stacks: (base: 20, per_level: 5)),
                    tags: ["Item.Ammo"],
                    droppable: true,
                ),
                (
                    id: "rifle",
                    name: "Rifle",
                    socket_slots: [
                        (slot: "Socket.Scope", default_attachment: Some("scope")),
                    ],
                ),
                (id: "scope", name: "Scope"),
            ],
        )
    "#;

    #[test]
    fn parses_catalog_with_defaults() {
        let oracle = DefinitionOracleImpl::from_ron_str(CATALOG).unwrap();
        assert_eq!(oracle.len(), 3);

        let arrow = oracle.definition(&"arrow".into()).unwrap();
        assert_eq!(
            arrow.stack_method,
            StackMethod::StackByType {
                max_stacks: ScalableStacks {
                    base: 20,
                    per_level: 5
                }
            }
        );
        assert!(arrow.droppable);
        assert!(arrow.tags.has_tag(&GameplayTag::new("Item").unwrap()));

        let rifle = oracle.definition(&"rifle".into()).unwrap();
        let socket = rifle
            .socket(&GameplayTag::new("Socket.Scope").unwrap())
            .unwrap();
        assert_eq!(socket.default_attachment, Some(DefinitionId::new("scope")));
        assert_eq!(rifle.stack_method, StackMethod::CanNotStack);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = DefinitionOracleImpl::from_definitions([
            ItemDefinition::new("sword", "Sword"),
            ItemDefinition::new("sword", "Other Sword"),
        ]);
        assert!(matches!(
            result,
            Err(OracleError::DuplicateDefinition { id }) if id == "sword"
        ));
    }

    #[test]
    fn malformed_ron_reports_parse_error() {
        assert!(matches!(
            DefinitionOracleImpl::from_ron_str("(items: [(id: 3)])"),
            Err(OracleError::Parse(_))
        ));
    }

    #[test]
    fn zero_stack_cap_is_invalid() {
        let definition = ItemDefinition::new("dust", "Dust").with_stack_method(
            StackMethod::StackByType {
                max_stacks: ScalableStacks::flat(0),
            },
        );
        assert!(matches!(
            DefinitionOracleImpl::from_definitions([definition]),
            Err(OracleError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DefinitionOracleImpl::from_file(dir.path().join("absent.ron")),
            Err(OracleError::Io { .. })
        ));
    }
}
