// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Hub Protocol: Core Library
//!
//! A Hub stores the messages of a decentralized social graph (casts,
//! reactions, follows, verifications, signer grants, profile data) and
//! keeps its copy in step with other Hubs without any coordinator.
//!
//! Two ideas carry the whole design:
//!
//! 1. **Every store is a CRDT.** For each `(fid, slot)` at most one message
//!    wins, chosen by a total order over timestamp, kind and hash. Replicas
//!    that have merged the same messages, in any order, agree on the
//!    winners.
//! 2. **Agreement is cheap to check.** Every stored message's sync id sits
//!    in a Merkle trie. Equal record sets give equal digests, and unequal
//!    ones can be narrowed down to the differing ids by walking only the
//!    subtrees whose digests disagree.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants: id lengths, sync thresholds, limits.
//! - **error**: `HubError`, one taxonomy for every layer.
//! - **crypto**: BLAKE3 truncated to 160 bits.
//! - **message**: The closed set of message kinds and their bodies.
//! - **storage**: sled keyspace, the six CRDT stores, the merge engine.
//! - **sync**: Sync ids, the Merkle trie, the reconciliation protocol.
//! - **hub**: Lifecycle facade the node binary drives.
//!
//! ## Design Philosophy
//!
//! 1. Deterministic over clever. Every tie has exactly one winner.
//! 2. State changes are values. Stores return events; nothing is observed
//!    behind anyone's back.
//! 3. The trie is derived data. It can always be rebuilt from the stores.

pub mod config;
pub mod crypto;
pub mod error;
pub mod hub;
pub mod message;
pub mod storage;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{BadRequestKind, HubError, HubResult};
pub use hub::{Hub, HubConfig, HubStatus};
pub use message::{Message, MessageBody, MessageData};
