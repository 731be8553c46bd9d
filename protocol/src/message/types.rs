//! Core type definitions for Hub messages.
//!
//! Every record a user authors is one `MessageBody` variant. The set is
//! closed: a store decides how to treat a message with an exhaustive match,
//! so adding a kind is a compile error everywhere it matters.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Hash160;

/// Numeric identity under which records are authored.
pub type Fid = u64;

/// BLAKE3-160 digest of a message's data.
pub type MessageHash = Hash160;

/// Opaque delegate key that produced a message.
pub type SignerKey = [u8; 32];

/// 20-byte Ethereum address.
pub type EthAddress = [u8; 20];

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Wire discriminant of a message kind. The numeric values are persisted in
/// the by-signer index and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    CastAdd = 1,
    CastRemove = 2,
    ReactionAdd = 3,
    ReactionRemove = 4,
    FollowAdd = 5,
    FollowRemove = 6,
    VerificationAddEthAddress = 7,
    VerificationRemove = 8,
    SignerAdd = 9,
    SignerRemove = 10,
    UserDataAdd = 11,
}

impl MessageType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CastAdd => "CastAdd",
            Self::CastRemove => "CastRemove",
            Self::ReactionAdd => "ReactionAdd",
            Self::ReactionRemove => "ReactionRemove",
            Self::FollowAdd => "FollowAdd",
            Self::FollowRemove => "FollowRemove",
            Self::VerificationAddEthAddress => "VerificationAddEthAddress",
            Self::VerificationRemove => "VerificationRemove",
            Self::SignerAdd => "SignerAdd",
            Self::SignerRemove => "SignerRemove",
            Self::UserDataAdd => "UserDataAdd",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Shared body pieces
// ---------------------------------------------------------------------------

/// Globally unique reference to a cast: its author and its hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CastId {
    pub fid: Fid,
    pub hash: MessageHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReactionType {
    Like = 1,
    Recast = 2,
}

impl ReactionType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UserDataType {
    Pfp = 1,
    Display = 2,
    Bio = 3,
    Url = 5,
    Fname = 6,
}

impl UserDataType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastAddBody {
    pub text: String,
    pub embeds: Vec<String>,
    pub mentions: Vec<Fid>,
    pub parent: Option<CastId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastRemoveBody {
    pub target_hash: MessageHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionBody {
    pub reaction_type: ReactionType,
    pub target: CastId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowBody {
    pub target_fid: Fid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationAddBody {
    pub address: EthAddress,
    pub eth_signature: Vec<u8>,
    pub block_hash: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRemoveBody {
    pub address: EthAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerBody {
    pub signer: SignerKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDataBody {
    pub data_type: UserDataType,
    pub value: String,
}

/// The payload of a message, one variant per message kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    CastAdd(CastAddBody),
    CastRemove(CastRemoveBody),
    ReactionAdd(ReactionBody),
    ReactionRemove(ReactionBody),
    FollowAdd(FollowBody),
    FollowRemove(FollowBody),
    VerificationAddEthAddress(VerificationAddBody),
    VerificationRemove(VerificationRemoveBody),
    SignerAdd(SignerBody),
    SignerRemove(SignerBody),
    UserDataAdd(UserDataBody),
}

impl MessageBody {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::CastAdd(_) => MessageType::CastAdd,
            Self::CastRemove(_) => MessageType::CastRemove,
            Self::ReactionAdd(_) => MessageType::ReactionAdd,
            Self::ReactionRemove(_) => MessageType::ReactionRemove,
            Self::FollowAdd(_) => MessageType::FollowAdd,
            Self::FollowRemove(_) => MessageType::FollowRemove,
            Self::VerificationAddEthAddress(_) => MessageType::VerificationAddEthAddress,
            Self::VerificationRemove(_) => MessageType::VerificationRemove,
            Self::SignerAdd(_) => MessageType::SignerAdd,
            Self::SignerRemove(_) => MessageType::SignerRemove,
            Self::UserDataAdd(_) => MessageType::UserDataAdd,
        }
    }

    /// Remove-kind messages rank above Add-kind messages at equal timestamps.
    pub fn is_remove(&self) -> bool {
        matches!(
            self,
            Self::CastRemove(_)
                | Self::ReactionRemove(_)
                | Self::FollowRemove(_)
                | Self::VerificationRemove(_)
                | Self::SignerRemove(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_bytes_are_stable() {
        assert_eq!(MessageType::CastAdd.as_byte(), 1);
        assert_eq!(MessageType::SignerRemove.as_byte(), 10);
        assert_eq!(MessageType::UserDataAdd.as_byte(), 11);
    }

    #[test]
    fn removes_are_flagged() {
        let remove = MessageBody::FollowRemove(FollowBody { target_fid: 7 });
        let add = MessageBody::FollowAdd(FollowBody { target_fid: 7 });
        assert!(remove.is_remove());
        assert!(!add.is_remove());
        assert_eq!(remove.message_type(), MessageType::FollowRemove);
    }

    #[test]
    fn user_data_add_is_not_a_remove() {
        let body = MessageBody::UserDataAdd(UserDataBody {
            data_type: UserDataType::Bio,
            value: "gm".into(),
        });
        assert!(!body.is_remove());
        assert_eq!(body.message_type().to_string(), "UserDataAdd");
    }
}
