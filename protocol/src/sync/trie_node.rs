//! Trie node storage and the read-only views the trie hands out.
//!
//! Nodes live in an arena owned by `MerkleTrie` and refer to each other by
//! index, so splitting a leaf or pulling a child up during delete only moves
//! indices around.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{empty_hash, Hash160};
use crate::sync::sync_id::SyncId;

/// Index of a node inside the trie arena.
pub(crate) type NodeId = usize;

/// One trie node. A node with no children is a leaf; a leaf below the
/// timestamp depth carries the full sync id it stands for.
#[derive(Debug, Clone)]
pub(crate) struct TrieNode {
    pub(crate) hash: Hash160,
    pub(crate) items: usize,
    /// Sorted by character, which is the order child digests are hashed in.
    pub(crate) children: BTreeMap<u8, NodeId>,
    pub(crate) key: Option<SyncId>,
}

impl TrieNode {
    pub(crate) fn new() -> Self {
        Self {
            hash: empty_hash(),
            items: 0,
            children: BTreeMap::new(),
            key: None,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Digest and count of the subtree at `prefix`, plus the same for each
/// direct child (whose own `children` are left empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub prefix: Vec<u8>,
    pub num_messages: usize,
    pub hash: Hash160,
    pub children: Vec<NodeMetadata>,
}

impl NodeMetadata {
    pub fn child(&self, ch: u8) -> Option<&NodeMetadata> {
        self.children.iter().find(|c| c.prefix.last() == Some(&ch))
    }
}

/// State of the trie along one path, used to compare two tries without
/// shipping either of them.
///
/// `excluded_hashes[i]` digests every sibling of `prefix[i]` at depth `i`;
/// the final entry is the digest of the node at the end of `prefix`.
/// `num_messages` counts the records in the excluded siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieSnapshot {
    pub prefix: Vec<u8>,
    pub excluded_hashes: Vec<Hash160>,
    pub num_messages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_empty_leaf() {
        let node = TrieNode::new();
        assert!(node.is_leaf());
        assert_eq!(node.items, 0);
        assert_eq!(node.hash, empty_hash());
        assert!(node.key.is_none());
    }

    #[test]
    fn child_lookup_by_last_prefix_byte() {
        let meta = NodeMetadata {
            prefix: b"00".to_vec(),
            num_messages: 2,
            hash: [0; 20],
            children: vec![
                NodeMetadata {
                    prefix: b"001".to_vec(),
                    num_messages: 1,
                    hash: [1; 20],
                    children: vec![],
                },
                NodeMetadata {
                    prefix: b"007".to_vec(),
                    num_messages: 1,
                    hash: [7; 20],
                    children: vec![],
                },
            ],
        };
        assert_eq!(meta.child(b'7').map(|c| c.hash), Some([7; 20]));
        assert!(meta.child(b'2').is_none());
    }
}
