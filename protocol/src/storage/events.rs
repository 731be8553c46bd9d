//! Typed store events.
//!
//! Every store operation that changes which records exist returns the
//! events describing the change. The caller hands them to the sync engine,
//! which applies the matching trie insert / delete. No event bus sits in
//! between.

use serde::{Deserialize, Serialize};

use crate::message::Message;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    /// `message` became a winner; `deleted_messages` lost their slot to it.
    MergeMessage {
        message: Message,
        deleted_messages: Vec<Message>,
    },
    /// `message` was dropped to keep its fid under the store's size limit.
    PruneMessage { message: Message },
    /// `message` was dropped because its signer was revoked.
    RevokeMessage { message: Message },
}

impl StoreEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MergeMessage { .. } => "merge",
            Self::PruneMessage { .. } => "prune",
            Self::RevokeMessage { .. } => "revoke",
        }
    }

    /// The message the event is about.
    pub fn message(&self) -> &Message {
        match self {
            Self::MergeMessage { message, .. }
            | Self::PruneMessage { message }
            | Self::RevokeMessage { message } => message,
        }
    }
}
