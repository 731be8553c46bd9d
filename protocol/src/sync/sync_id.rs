//! # Sync Ids
//!
//! The canonical record identifier: `pad10(timestamp) ++ hex(hash)`, one
//! ASCII character per trie level.
//!
//! ```text
//!  0 0 0 0 0 0 0 1 0 5 | 3 f a 9 ... (40 hex nibbles)
//!  └──── timestamp ───┘ └──────── message hash ───────┘
//! ```
//!
//! Because the timestamp is zero-padded decimal and the hash is lowercase
//! hex, byte-wise comparison of two ids orders them by time first and by
//! hash second. Both the trie and the stores rely on that.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{HASH_LENGTH, SYNC_ID_LENGTH, TIMESTAMP_LENGTH};
use crate::error::{BadRequestKind, HubError, HubResult};
use crate::message::{Message, MessageHash};

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncId(Vec<u8>);

impl SyncId {
    pub fn new(timestamp: u32, hash: &MessageHash) -> Self {
        let mut bytes = timestamp_prefix(timestamp);
        bytes.extend_from_slice(hex::encode(hash).as_bytes());
        Self(bytes)
    }

    pub fn from_message(message: &Message) -> Self {
        Self::new(message.timestamp(), &message.hash)
    }

    /// Validate raw bytes received from a peer or read from disk.
    pub fn parse(bytes: &[u8]) -> HubResult<Self> {
        if bytes.len() != SYNC_ID_LENGTH {
            return Err(invalid(format!(
                "expected {} bytes, got {}",
                SYNC_ID_LENGTH,
                bytes.len()
            )));
        }
        let (ts, hash) = bytes.split_at(TIMESTAMP_LENGTH);
        if !ts.iter().all(u8::is_ascii_digit) {
            return Err(invalid("timestamp is not decimal".to_string()));
        }
        if !hash.iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(invalid("hash is not lowercase hex".to_string()));
        }
        // Ten digits can exceed u32::MAX; such an id has no message behind it.
        let text = std::str::from_utf8(ts).map_err(|e| invalid(e.to_string()))?;
        text.parse::<u32>()
            .map_err(|_| invalid(format!("timestamp {} out of range", text)))?;
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn timestamp(&self) -> u32 {
        // Validated on construction.
        std::str::from_utf8(&self.0[..TIMESTAMP_LENGTH])
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn hash(&self) -> MessageHash {
        let mut out = [0u8; HASH_LENGTH];
        // Validated on construction.
        let _ = hex::decode_to_slice(&self.0[TIMESTAMP_LENGTH..], &mut out);
        out
    }
}

/// Zero-padded decimal rendering of a timestamp; the trie prefix that
/// covers every record at or below `timestamp`'s digits.
pub fn timestamp_prefix(timestamp: u32) -> Vec<u8> {
    format!("{:0width$}", timestamp, width = TIMESTAMP_LENGTH).into_bytes()
}

fn invalid(message: String) -> HubError {
    HubError::bad_request(BadRequestKind::InvalidSyncId, message)
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Always ASCII.
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncId({})", self)
    }
}

impl Serialize for SyncId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SyncId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SyncId::parse(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}
