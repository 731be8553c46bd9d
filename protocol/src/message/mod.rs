//! # Messages
//!
//! A message is one signed, timestamped record authored by a fid: a cast,
//! a reaction, a follow, a verification, a signer grant or revocation, or a
//! profile field. Hubs never mutate messages; they only decide which ones
//! are currently winning (see `storage::stores`).
//!
//! ## Hashing
//!
//! `Message::new` hashes the canonical `bincode` encoding of `MessageData`
//! with BLAKE3-160. The hash is the message's identity: together with the
//! timestamp it forms the sync id, and it is the tie-breaker in every
//! conflict the stores resolve.

pub mod time;
pub mod types;

use serde::{Deserialize, Serialize};

use crate::crypto::blake3_160;
use crate::error::{BadRequestKind, HubError, HubResult};

pub use time::{farcaster_time, from_farcaster_time, to_farcaster_time};
pub use types::*;

/// The signed part of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    pub fid: Fid,
    /// Seconds since the network epoch.
    pub timestamp: u32,
    pub body: MessageBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub data: MessageData,
    pub hash: MessageHash,
    pub signer: SignerKey,
}

impl Message {
    /// Build a message, computing its hash from `data`.
    pub fn new(data: MessageData, signer: SignerKey) -> HubResult<Self> {
        let hash = hash_message_data(&data)?;
        Ok(Self { data, hash, signer })
    }

    pub fn fid(&self) -> Fid {
        self.data.fid
    }

    pub fn timestamp(&self) -> u32 {
        self.data.timestamp
    }

    pub fn message_type(&self) -> MessageType {
        self.data.body.message_type()
    }

    pub fn is_remove(&self) -> bool {
        self.data.body.is_remove()
    }

    pub fn encode(&self) -> HubResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            HubError::bad_request(BadRequestKind::Validation, format!("encode message: {}", e))
        })
    }

    pub fn decode(bytes: &[u8]) -> HubResult<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| HubError::Unavailable(format!("corrupt stored message: {}", e)))
    }
}

/// BLAKE3-160 over the canonical encoding of `data`.
pub fn hash_message_data(data: &MessageData) -> HubResult<MessageHash> {
    let bytes = bincode::serialize(data).map_err(|e| {
        HubError::bad_request(BadRequestKind::Validation, format!("encode message data: {}", e))
    })?;
    Ok(blake3_160(&bytes))
}
