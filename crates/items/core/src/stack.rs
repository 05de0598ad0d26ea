//! Stacking policies attached to item definitions.
//!
//! A policy answers three questions when a spec is added to a store:
//!
//! 1. `can_add`: may an item of this definition enter the store at all?
//! 2. `can_stack`: should the store try to merge it into an existing record?
//! 3. `stack_check`: which record absorbs it, and how many stacks overflow?
//!
//! Policies are stateless; all state they inspect lives in the [`ItemsArray`].

use crate::array::ItemsArray;
use crate::id::ItemId;
use crate::spec::ItemSpec;

/// Result of a successful merge check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackOutcome {
    /// Existing record that absorbs the incoming stacks.
    pub existing: ItemId,
    /// Stack count the existing record ends up with.
    pub new_stacks: u16,
    /// Stacks that did not fit and need a fresh record.
    pub remaining_stacks: u16,
}

pub trait StackPolicy {
    fn can_add(&self, items: &ItemsArray, spec: &ItemSpec) -> bool;

    fn can_stack(&self, items: &ItemsArray, spec: &ItemSpec) -> bool;

    /// `None` means a new record must be created for the whole amount.
    fn stack_check(&self, items: &ItemsArray, spec: &ItemSpec) -> Option<StackOutcome>;
}

/// Stack cap that grows with item level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalableStacks {
    pub base: u16,
    #[cfg_attr(feature = "serde", serde(default))]
    pub per_level: u16,
}

impl ScalableStacks {
    pub const fn flat(base: u16) -> Self {
        Self { base, per_level: 0 }
    }

    /// Cap at `level` (levels start at 1). Never below 1.
    pub fn at(&self, level: u8) -> u16 {
        let bonus = self
            .per_level
            .saturating_mul(u16::from(level.saturating_sub(1)));
        self.base.saturating_add(bonus).max(1)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum StackMethod {
    /// Every add creates a new record.
    #[default]
    CanNotStack,

    /// At most one record of the definition may exist in a store.
    CanNotStackUnique,

    /// Records of the same definition merge up to `max_stacks`.
    StackByType { max_stacks: ScalableStacks },
}

impl StackPolicy for StackMethod {
    fn can_add(&self, items: &ItemsArray, spec: &ItemSpec) -> bool {
        match self {
            Self::CanNotStackUnique => items.find_by_definition(&spec.definition).is_none(),
            Self::CanNotStack | Self::StackByType { .. } => true,
        }
    }

    fn can_stack(&self, _items: &ItemsArray, _spec: &ItemSpec) -> bool {
        matches!(self, Self::StackByType { .. })
    }

    fn stack_check(&self, items: &ItemsArray, spec: &ItemSpec) -> Option<StackOutcome> {
        let Self::StackByType { max_stacks } = self else {
            return None;
        };

        let max = max_stacks.at(spec.level);
        let existing = items
            .iter()
            .filter(|item| item.definition() == &spec.definition && !item.is_attached())
            .find(|item| item.stacks() < max)?;

        let total = u32::from(existing.stacks()) + u32::from(spec.amount);
        let new_stacks = total.min(u32::from(max)) as u16;
        let remaining_stacks = (total - u32::from(new_stacks)) as u16;

        Some(StackOutcome {
            existing: existing.id(),
            new_stacks,
            remaining_stacks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stackable(max: u16) -> StackMethod {
        StackMethod::StackByType {
            max_stacks: ScalableStacks::flat(max),
        }
    }

    fn array_with(spec: &ItemSpec) -> (ItemsArray, ItemId) {
        let mut items = ItemsArray::new();
        let id = items.add(ItemId::generate(), spec);
        (items, id)
    }

    #[test]
    fn stack_by_type_caps_and_reports_overflow() {
        let (items, existing) = array_with(&ItemSpec::new("arrow", 4));

        let outcome = stackable(5)
            .stack_check(&items, &ItemSpec::new("arrow", 3))
            .unwrap();

        assert_eq!(outcome.existing, existing);
        assert_eq!(outcome.new_stacks, 5);
        assert_eq!(outcome.remaining_stacks, 2);
    }

    #[test]
    fn stack_by_type_skips_full_stacks() {
        let (items, _) = array_with(&ItemSpec::new("arrow", 5));

        assert_eq!(
            stackable(5).stack_check(&items, &ItemSpec::new("arrow", 1)),
            None
        );
    }

    #[test]
    fn stack_by_type_ignores_other_definitions() {
        let (items, _) = array_with(&ItemSpec::new("bolt", 1));

        assert_eq!(
            stackable(5).stack_check(&items, &ItemSpec::new("arrow", 1)),
            None
        );
    }

    #[test]
    fn unique_refuses_second_copy() {
        let spec = ItemSpec::new("amulet", 1);
        let empty = ItemsArray::new();
        assert!(StackMethod::CanNotStackUnique.can_add(&empty, &spec));

        let (items, _) = array_with(&spec);
        assert!(!StackMethod::CanNotStackUnique.can_add(&items, &spec));
        assert!(!StackMethod::CanNotStackUnique.can_stack(&items, &spec));
    }

    #[test]
    fn can_not_stack_always_adds_fresh_records() {
        let (items, _) = array_with(&ItemSpec::new("sword", 1));
        let spec = ItemSpec::new("sword", 1);

        assert!(StackMethod::CanNotStack.can_add(&items, &spec));
        assert!(!StackMethod::CanNotStack.can_stack(&items, &spec));
        assert_eq!(StackMethod::CanNotStack.stack_check(&items, &spec), None);
    }

    #[test]
    fn scalable_cap_grows_with_level() {
        let cap = ScalableStacks {
            base: 10,
            per_level: 5,
        };
        assert_eq!(cap.at(1), 10);
        assert_eq!(cap.at(3), 20);
        assert_eq!(cap.at(0), 10);
        assert_eq!(ScalableStacks::flat(0).at(1), 1);
    }
}
