//! # Storage Module
//!
//! Everything a Hub persists, and the rules deciding what it keeps.
//!
//! ## Architecture
//!
//! ```text
//! db.rs      : sled-backed key-value store with atomic batches
//! keys.rs    : byte layout of every persisted key
//! events.rs  : merge / prune / revoke events handed to the sync engine
//! stores/    : generic CRDT store plus one specialization per entity
//! engine.rs  : the six stores behind one merge entry point
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! Message → Engine ──authorize──→ Store<K>::merge → WriteBatch → HubDb
//!                                        │
//!                                        └──→ Vec<StoreEvent> → MerkleTrie
//! ```
//!
//! ## Design Decisions
//!
//! 1. **One keyspace.** All stores share a single sled tree; the root prefix
//!    byte and the per-user postfix byte keep them apart. This lets the
//!    engine enumerate every message with one prefix scan.
//!
//! 2. **Bincode on disk.** Messages are stored in the same canonical
//!    encoding they are hashed in. JSON is for the node's HTTP surface.
//!
//! 3. **Events, not callbacks.** Stores return what they changed. Nothing
//!    is observed indirectly.

pub mod db;
pub mod engine;
pub mod events;
pub mod keys;
pub mod stores;

pub use db::{DbError, DbResult, HubDb};
pub use engine::{Engine, StoreConfig};
pub use events::StoreEvent;
