//! # Protocol Configuration & Constants
//!
//! Every magic number the Hub agrees on with its peers lives here. Two Hubs
//! that disagree on any value in the "wire" sections below will compute
//! different trie digests for the same records and never converge, so treat
//! those as frozen. The tunables further down are local policy and can be
//! overridden per deployment through `StoreConfig` / `SyncConfig`.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Network epoch: 2021-01-01T00:00:00Z in unix milliseconds. Message
/// timestamps count whole seconds from here, which keeps them inside `u32`
/// for the next century.
pub const FARCASTER_EPOCH_MS: i64 = 1_609_459_200_000;

// ---------------------------------------------------------------------------
// Canonical Record Identifier
// ---------------------------------------------------------------------------

/// Number of leading characters of a sync id taken by the zero-padded
/// decimal timestamp. The trie never compacts above this depth.
pub const TIMESTAMP_LENGTH: usize = 10;

/// Length in bytes of a message hash (BLAKE3 truncated to 160 bits).
pub const HASH_LENGTH: usize = 20;

/// Full sync id length: timestamp digits plus two hex nibbles per hash byte.
pub const SYNC_ID_LENGTH: usize = TIMESTAMP_LENGTH + HASH_LENGTH * 2;

/// Length in bytes of a signer key.
pub const SIGNER_KEY_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Merkle Trie
// ---------------------------------------------------------------------------

/// Upper bound on values returned by a single `get_all_values` walk.
pub const MAX_VALUES_RETURNED_PER_CALL: usize = 1_000;

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Snapshots are taken at timestamps floored to this many seconds. Records
/// newer than the snapshot timestamp are left for the next round.
pub const SYNC_THRESHOLD_SECS: u32 = 10;

/// A peer subtree holding at most this many records is fetched as a flat
/// id list instead of being descended into.
pub const HASHES_PER_FETCH: usize = 50;

/// How long `stop()` waits for an in-flight sync to notice the interrupt.
pub const SYNC_INTERRUPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-request timeout for peer calls.
pub const SYNC_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on concurrent in-flight peer requests during one sync.
pub const MAX_CONCURRENT_SYNC_REQUESTS: usize = 4;

// ---------------------------------------------------------------------------
// Store Limits
// ---------------------------------------------------------------------------

pub const CAST_PRUNE_LIMIT: usize = 10_000;
pub const REACTION_PRUNE_LIMIT: usize = 5_000;
pub const FOLLOW_PRUNE_LIMIT: usize = 5_000;
pub const VERIFICATION_PRUNE_LIMIT: usize = 50;
pub const SIGNER_PRUNE_LIMIT: usize = 100;
pub const USER_DATA_PRUNE_LIMIT: usize = 100;
