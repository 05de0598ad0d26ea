//! Event types for different topics.

use serde::{Deserialize, Serialize};

use items_core::{CommandOutcome, StoreEvent, StoreId};

use crate::api::wire::{ClientId, CommandId};

/// Which replica of a store produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Authority,
    Client(ClientId),
}

/// A store mutation, as observed by one replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreChange {
    pub origin: Origin,
    pub store: StoreId,
    pub event: StoreEvent,
}

/// Events describing the lifecycle of replicated commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandEvent {
    /// A client predicted and submitted a command
    Sent {
        client: ClientId,
        id: CommandId,
        tag: String,
    },

    /// The authority executed a command successfully
    Executed {
        client: ClientId,
        id: CommandId,
        tag: String,
        outcome: CommandOutcome,
    },

    /// The authority refused a command (decode failure, stale version, rule violation)
    Rejected {
        client: ClientId,
        id: CommandId,
        tag: String,
        error: String,
    },

    /// A client received the verdict and released its prediction locks
    Confirmed {
        client: ClientId,
        id: CommandId,
        success: bool,
    },

    /// A client gave up waiting and rolled the command back
    TimedOut {
        client: ClientId,
        id: CommandId,
        tag: String,
    },
}

/// Events related to store replication (lightweight)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationEvent {
    /// The authority sent a delta to a client
    DeltaSent {
        client: ClientId,
        store: StoreId,
        from_key: u64,
        to_key: u64,
        full: bool,
    },

    /// A client folded a delta into its replica
    DeltaApplied {
        client: ClientId,
        store: StoreId,
        changes: usize,
    },
}
