//! Replicated commands.
//!
//! A command is prepared on a client, travels to the authority and executes
//! there; the client then learns the result through replication plus an
//! explicit confirmation. The lifecycle is:
//!
//! 1. `can_send_command` (client, pure): is the request plausible against the
//!    replica right now?
//! 2. `pre_send_command` (client): take prediction locks and snapshot the
//!    versions of every item the command relies on.
//! 3. `execute` (authority): re-validate the versions, then mutate.
//! 4. `command_confirmed` (client): release whatever step 2 acquired.
//!
//! Commands are open for extension: new kinds implement
//! [`ReplicatedCommand`] and [`TaggedCommand`] and are registered with the
//! runtime's command registry by tag.

mod error;
mod guard;
mod kinds;

pub use error::CommandError;
pub use guard::{ExpectedVersion, VersionGuard};
pub use kinds::{
    AttachItem, DetachItem, DropItem, EquipItem, EquipNewItem, MoveItemBetweenStores,
    MoveItemToSlot, RemoveItemFromSlot,
};

use std::fmt;

use crate::id::ItemId;
use crate::spec::ItemSpec;
use crate::store::ItemsStores;

/// What a successful execution produced, reported back in the confirmation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandOutcome {
    #[default]
    Done,
    /// The item the command ended up acting on (possibly newly created).
    Item(ItemId),
    /// Description of what left the store, for spawning a pickup.
    Dropped(ItemSpec),
}

pub trait ReplicatedCommand: fmt::Debug + Send {
    /// Stable wire tag; see [`TaggedCommand::TAG`].
    fn type_tag(&self) -> &'static str;

    fn can_send_command(&self, stores: &ItemsStores) -> Result<(), CommandError>;

    fn pre_send_command(&mut self, stores: &mut ItemsStores);

    /// Runs on the authority. On error no store has been modified.
    fn execute(&self, stores: &mut ItemsStores) -> Result<CommandOutcome, CommandError>;

    /// Runs on the client once the authority answered, or when the command
    /// is abandoned. Must release everything `pre_send_command` acquired.
    fn command_confirmed(&mut self, stores: &mut ItemsStores, success: bool);

    /// Whether the caller wants the outcome surfaced. The authority answers
    /// every command regardless.
    fn needs_confirmation(&self) -> bool {
        true
    }
}

/// Compile-time wire tag for a command type.
pub trait TaggedCommand {
    const TAG: &'static str;
}
