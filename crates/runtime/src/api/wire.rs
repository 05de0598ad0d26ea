//! Messages exchanged between client sessions and the authority.
//!
//! Commands cross the link as a tagged, bincode-encoded payload so the
//! authority can decode them through the [`super::CommandRegistry`] without a
//! closed enum of command kinds.
use std::fmt;

use serde::{Deserialize, Serialize};

use items_core::{CommandOutcome, ItemsDelta, ReplicatedCommand, StoreId};

use super::errors::{Result, RuntimeError};

/// Identifies one connected client session.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Client-local sequence number of a submitted command.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CommandId(pub u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub tag: String,
    pub payload: Vec<u8>,
}

impl CommandEnvelope {
    /// Encodes `command` once; the payload is never re-encoded downstream.
    pub fn encode<C>(id: CommandId, command: &C) -> Result<Self>
    where
        C: ReplicatedCommand + Serialize,
    {
        let tag = command.type_tag();
        let payload = bincode::serialize(command).map_err(|e| RuntimeError::Encode {
            tag: tag.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            id,
            tag: tag.to_string(),
            payload,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    Submit(CommandEnvelope),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Changes to one store since the last delta sent to this client.
    Replicate { store: StoreId, delta: ItemsDelta },

    /// Verdict for a submitted command, sent after its replication.
    Confirm {
        id: CommandId,
        success: bool,
        outcome: CommandOutcome,
        /// Rejection reason when `success` is false.
        error: Option<String>,
    },
}

impl ServerMessage {
    pub fn rejected(id: CommandId, error: impl fmt::Display) -> Self {
        Self::Confirm {
            id,
            success: false,
            outcome: CommandOutcome::Done,
            error: Some(error.to_string()),
        }
    }
}
