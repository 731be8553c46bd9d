//! # Sync Module
//!
//! How two Hubs find out which messages one has and the other lacks.
//!
//! ```text
//! sync_id.rs      : the 50-byte, time-ordered record identifier
//! trie_node.rs    : arena node plus the metadata / snapshot views
//! merkle_trie.rs  : digest-carrying radix trie over sync ids
//! sync_engine.rs  : trie maintenance and the reconciliation protocol
//! peer.rs         : what a remote Hub looks like to the engine
//! ```

pub mod merkle_trie;
pub mod peer;
pub mod sync_engine;
pub mod sync_id;
pub mod trie_node;

pub use merkle_trie::MerkleTrie;
pub use peer::{SyncPeer, SyncTransport, TransportPeer};
pub use sync_engine::{SyncConfig, SyncEngine, SyncRequest, SyncResponse, SyncStats};
pub use sync_id::{timestamp_prefix, SyncId};
pub use trie_node::{NodeMetadata, TrieSnapshot};
