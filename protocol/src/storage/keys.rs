//! Persisted key layout.
//!
//! ```text
//! primary record   [User] fid(8) postfix(1) sync_id(50)          -> bincode(Message)
//! winner index     [User] fid(8) adds|removes(1) target           -> sync_id
//! by-signer index  [User] fid(8) [BySigner] signer(32) postfix(1) sync_id -> ()
//! global index     [root] target fid(8) sync_id(50)               -> ()
//! owner index      [VerificationsByAddress] address(20)            -> fid(8)
//! hash index       [MessagesByHash] hash(20)                      -> primary key
//! ```
//!
//! Integers are big-endian so that key order matches numeric order, and the
//! sync id suffix makes each fid's records iterate oldest first.

use crate::config::SYNC_ID_LENGTH;
use crate::message::{CastId, EthAddress, Fid, MessageHash, SignerKey};
use crate::storage::db::{DbError, DbResult};
use crate::sync::sync_id::SyncId;

/// First byte of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RootPrefix {
    User = 1,
    CastsByParent = 2,
    CastsByMention = 3,
    ReactionsByTarget = 4,
    FollowsByTarget = 5,
    VerificationsByAddress = 6,
    MessagesByHash = 7,
}

/// Byte following the fid in per-user keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UserPostfix {
    CastMessage = 1,
    ReactionMessage = 2,
    FollowMessage = 3,
    VerificationMessage = 4,
    SignerMessage = 5,
    UserDataMessage = 6,

    BySigner = 16,

    CastAdds = 32,
    CastRemoves = 33,
    ReactionAdds = 34,
    ReactionRemoves = 35,
    FollowAdds = 36,
    FollowRemoves = 37,
    VerificationAdds = 38,
    VerificationRemoves = 39,
    SignerAdds = 40,
    SignerRemoves = 41,
    UserDataAdds = 42,
}

/// Postfixes below this value hold primary message records.
const MESSAGE_POSTFIX_END: u8 = UserPostfix::BySigner as u8;

const FID_LENGTH: usize = 8;
const USER_KEY_LENGTH: usize = 1 + FID_LENGTH;

pub fn user_key(fid: Fid) -> Vec<u8> {
    let mut key = Vec::with_capacity(USER_KEY_LENGTH + 1 + SYNC_ID_LENGTH);
    key.push(RootPrefix::User as u8);
    key.extend_from_slice(&fid.to_be_bytes());
    key
}

/// Prefix of every primary record (or every index entry) of one kind for a fid.
pub fn user_postfix_prefix(fid: Fid, postfix: UserPostfix) -> Vec<u8> {
    let mut key = user_key(fid);
    key.push(postfix as u8);
    key
}

pub fn message_key(fid: Fid, postfix: UserPostfix, sync_id: &SyncId) -> Vec<u8> {
    let mut key = user_postfix_prefix(fid, postfix);
    key.extend_from_slice(sync_id.as_bytes());
    key
}

pub fn index_key(fid: Fid, postfix: UserPostfix, target: &[u8]) -> Vec<u8> {
    let mut key = user_postfix_prefix(fid, postfix);
    key.extend_from_slice(target);
    key
}

/// Prefix of one store's by-signer entries; `postfix` is the store's
/// primary message postfix.
pub fn by_signer_prefix(fid: Fid, signer: &SignerKey, postfix: UserPostfix) -> Vec<u8> {
    let mut key = user_postfix_prefix(fid, UserPostfix::BySigner);
    key.extend_from_slice(signer);
    key.push(postfix as u8);
    key
}

pub fn by_signer_key(
    fid: Fid,
    signer: &SignerKey,
    postfix: UserPostfix,
    sync_id: &SyncId,
) -> Vec<u8> {
    let mut key = by_signer_prefix(fid, signer, postfix);
    key.extend_from_slice(sync_id.as_bytes());
    key
}

pub fn global_index_prefix(root: RootPrefix, target: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + target.len() + FID_LENGTH + SYNC_ID_LENGTH);
    key.push(root as u8);
    key.extend_from_slice(target);
    key
}

pub fn global_index_key(root: RootPrefix, target: &[u8], fid: Fid, sync_id: &SyncId) -> Vec<u8> {
    let mut key = global_index_prefix(root, target);
    key.extend_from_slice(&fid.to_be_bytes());
    key.extend_from_slice(sync_id.as_bytes());
    key
}

/// `fid(8) ++ hash(20)`, the index form of a cast reference.
pub fn cast_id_key(cast: &CastId) -> Vec<u8> {
    let mut key = Vec::with_capacity(FID_LENGTH + cast.hash.len());
    key.extend_from_slice(&cast.fid.to_be_bytes());
    key.extend_from_slice(&cast.hash);
    key
}

/// Global `hash -> primary key` index, used to serve records by sync id.
pub fn message_by_hash_key(hash: &MessageHash) -> Vec<u8> {
    global_index_prefix(RootPrefix::MessagesByHash, hash)
}

pub fn verification_owner_key(address: &EthAddress) -> Vec<u8> {
    global_index_prefix(RootPrefix::VerificationsByAddress, address)
}

/// Recover `(fid, sync_id)` from the tail of a global index key.
pub fn parse_global_index_tail(key: &[u8]) -> DbResult<(Fid, SyncId)> {
    let tail_len = FID_LENGTH + SYNC_ID_LENGTH;
    if key.len() < 1 + tail_len {
        return Err(DbError::Serialization(format!(
            "index key of {} bytes is too short",
            key.len()
        )));
    }
    let tail = &key[key.len() - tail_len..];
    let fid = decode_fid(&tail[..FID_LENGTH])?;
    let sync_id = SyncId::parse(&tail[FID_LENGTH..])
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    Ok((fid, sync_id))
}

/// Recover the sync id from the tail of a by-signer index key.
pub fn parse_sync_id_tail(key: &[u8]) -> DbResult<SyncId> {
    if key.len() < SYNC_ID_LENGTH {
        return Err(DbError::Serialization("key shorter than a sync id".to_string()));
    }
    SyncId::parse(&key[key.len() - SYNC_ID_LENGTH..])
        .map_err(|e| DbError::Serialization(e.to_string()))
}

/// True when `key` addresses a primary message record.
pub fn is_message_key(key: &[u8]) -> bool {
    key.len() == USER_KEY_LENGTH + 1 + SYNC_ID_LENGTH
        && key[0] == RootPrefix::User as u8
        && (1..MESSAGE_POSTFIX_END).contains(&key[USER_KEY_LENGTH])
}

pub fn encode_fid(fid: Fid) -> [u8; FID_LENGTH] {
    fid.to_be_bytes()
}

pub fn decode_fid(bytes: &[u8]) -> DbResult<Fid> {
    let raw: [u8; FID_LENGTH] = bytes
        .try_into()
        .map_err(|_| DbError::Serialization("invalid fid bytes".to_string()))?;
    Ok(Fid::from_be_bytes(raw))
}
