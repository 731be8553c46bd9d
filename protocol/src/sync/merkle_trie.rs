//! # Merkle Trie
//!
//! An in-memory radix trie over sync ids where every node carries the
//! BLAKE3-160 digest of its subtree and the number of records below it. Two
//! Hubs holding the same records hold byte-identical tries, so comparing
//! digests top-down finds exactly the ranges where they differ.
//!
//! ## Shape
//!
//! ```text
//! depth 0..10   one node per timestamp digit, never compacted
//! depth 10..50  lazily materialized: a subtree with a single record is a
//!               leaf holding the full id; a second record splits it down
//!               to the first differing character
//! ```
//!
//! The fixed timestamp levels let peers ask for digests at any time
//! granularity down to one second. Below them, compaction keeps the node
//! count proportional to the record count.
//!
//! ## Design Decisions
//!
//! - **Canonical form.** `delete` pulls a lone keyed child back up into its
//!   parent below the timestamp depth and drops empty nodes everywhere.
//!   The trie after `insert(x); delete(x)` is therefore identical to the
//!   trie that never saw `x`, node for node and digest for digest.
//!
//! - **Incremental digests.** Only the nodes on the touched path are
//!   re-hashed; the root digest and item count are O(1) reads.
//!
//! - **Arena storage.** Nodes sit in a `Vec` and link by index, with a free
//!   list for slots released by deletes.

use crate::config::{MAX_VALUES_RETURNED_PER_CALL, TIMESTAMP_LENGTH};
use crate::crypto::{blake3_160, blake3_160_multi, empty_hash, Hash160};
use crate::sync::sync_id::SyncId;
use crate::sync::trie_node::{NodeId, NodeMetadata, TrieNode, TrieSnapshot};

const ROOT: NodeId = 0;

#[derive(Debug, Clone)]
pub struct MerkleTrie {
    nodes: Vec<TrieNode>,
    free: Vec<NodeId>,
}

impl Default for MerkleTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl MerkleTrie {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::new()],
            free: Vec::new(),
        }
    }

    pub fn root_hash(&self) -> Hash160 {
        self.nodes[ROOT].hash
    }

    /// Number of records in the trie.
    pub fn items(&self) -> usize {
        self.nodes[ROOT].items
    }

    pub fn is_empty(&self) -> bool {
        self.items() == 0
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert a sync id. Returns `false` if it was already present.
    pub fn insert(&mut self, id: &SyncId) -> bool {
        let key = id.as_bytes();
        let mut path: Vec<NodeId> = Vec::with_capacity(key.len());
        let mut node = ROOT;
        let mut depth = 0;

        loop {
            if depth >= TIMESTAMP_LENGTH && self.nodes[node].is_leaf() {
                if self.nodes[node].key.is_none() {
                    let leaf = &mut self.nodes[node];
                    leaf.hash = blake3_160(key);
                    leaf.items = 1;
                    leaf.key = Some(id.clone());
                    break;
                }
                if self.nodes[node].key.as_ref() == Some(id) {
                    return false;
                }
                self.split_leaf(node, depth);
            }

            // Distinct ids differ before the last character, so a walk that
            // is still going has a character left to follow.
            let Some(&ch) = key.get(depth) else {
                return false;
            };
            let child = match self.nodes[node].children.get(&ch) {
                Some(&child) => child,
                None => {
                    let child = self.alloc();
                    self.nodes[node].children.insert(ch, child);
                    child
                }
            };
            path.push(node);
            node = child;
            depth += 1;
        }

        for &ancestor in path.iter().rev() {
            self.nodes[ancestor].items += 1;
            self.update_hash(ancestor);
        }
        true
    }

    /// Delete a sync id. Returns `false` if it was not present.
    pub fn delete(&mut self, id: &SyncId) -> bool {
        let key = id.as_bytes();
        let mut path: Vec<(NodeId, u8)> = Vec::with_capacity(key.len());
        let mut node = ROOT;

        loop {
            let current = &self.nodes[node];
            if current.is_leaf() {
                if current.key.as_ref() == Some(id) {
                    break;
                }
                return false;
            }
            let Some(&ch) = key.get(path.len()) else {
                return false;
            };
            match current.children.get(&ch) {
                Some(&child) => {
                    path.push((node, ch));
                    node = child;
                }
                None => return false,
            }
        }

        let leaf = &mut self.nodes[node];
        leaf.key = None;
        leaf.items = 0;

        let mut child = node;
        for (depth, &(parent, ch)) in path.iter().enumerate().rev() {
            self.nodes[parent].items -= 1;

            if self.nodes[child].items == 0 {
                self.nodes[parent].children.remove(&ch);
                self.release(child);
            }

            if depth >= TIMESTAMP_LENGTH
                && self.nodes[parent].items == 1
                && self.nodes[parent].children.len() == 1
            {
                self.pull_up_only_child(parent);
            }

            self.update_hash(parent);
            child = parent;
        }
        true
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn exists(&self, id: &SyncId) -> bool {
        self.get(id).is_some()
    }

    /// Return the stored id equal to `id`, if any.
    pub fn get(&self, id: &SyncId) -> Option<&SyncId> {
        let key = id.as_bytes();
        let mut node = ROOT;
        let mut depth = 0;
        loop {
            let current = &self.nodes[node];
            if current.is_leaf() {
                return current.key.as_ref().filter(|k| *k == id);
            }
            let ch = key.get(depth)?;
            node = *current.children.get(ch)?;
            depth += 1;
        }
    }

    /// Digest and count of the node at exactly `prefix`, with its children.
    /// `None` when no node sits at that prefix, including a prefix that runs
    /// past a compacted leaf.
    pub fn get_node_metadata(&self, prefix: &[u8]) -> Option<NodeMetadata> {
        let id = self.find_node(prefix)?;
        let node = &self.nodes[id];
        let children = node
            .children
            .iter()
            .map(|(&ch, &child)| {
                let mut child_prefix = prefix.to_vec();
                child_prefix.push(ch);
                NodeMetadata {
                    prefix: child_prefix,
                    num_messages: self.nodes[child].items,
                    hash: self.nodes[child].hash,
                    children: Vec::new(),
                }
            })
            .collect();
        Some(NodeMetadata {
            prefix: prefix.to_vec(),
            num_messages: node.items,
            hash: node.hash,
            children,
        })
    }

    /// Walk `prefix`, recording at each depth the digest of every sibling of
    /// the branch taken. Stops early, with a shortened prefix, when the walk
    /// leaves the materialized trie.
    pub fn get_snapshot(&self, prefix: &[u8]) -> TrieSnapshot {
        let mut excluded_hashes = Vec::with_capacity(prefix.len() + 1);
        let mut num_messages = 0;
        let mut node = ROOT;

        for (i, &ch) in prefix.iter().enumerate() {
            let (hash, items) = self.excluded_hash(node, ch);
            excluded_hashes.push(hash);
            num_messages += items;

            match self.nodes[node].children.get(&ch) {
                Some(&child) => node = child,
                None => {
                    return TrieSnapshot {
                        prefix: prefix[..i].to_vec(),
                        excluded_hashes,
                        num_messages,
                    }
                }
            }
        }

        excluded_hashes.push(self.nodes[node].hash);
        TrieSnapshot {
            prefix: prefix.to_vec(),
            excluded_hashes,
            num_messages,
        }
    }

    /// Longest leading part of `prefix` over which our excluded hashes
    /// match `their_excluded_hashes` position by position.
    pub fn get_divergence_prefix(&self, prefix: &[u8], their_excluded_hashes: &[Hash160]) -> Vec<u8> {
        let ours = self.get_snapshot(prefix).excluded_hashes;
        for i in 0..prefix.len() {
            if ours.get(i) != their_excluded_hashes.get(i) {
                return prefix[..i].to_vec();
            }
        }
        prefix.to_vec()
    }

    /// Every id under `prefix` in ascending order, capped at
    /// `MAX_VALUES_RETURNED_PER_CALL`.
    pub fn get_all_values(&self, prefix: &[u8]) -> Vec<SyncId> {
        let Some(start) = self.find_node(prefix) else {
            return Vec::new();
        };
        let mut values = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if let Some(key) = &node.key {
                values.push(key.clone());
                if values.len() >= MAX_VALUES_RETURNED_PER_CALL {
                    break;
                }
            }
            stack.extend(node.children.values().rev());
        }
        values
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn find_node(&self, prefix: &[u8]) -> Option<NodeId> {
        let mut node = ROOT;
        for ch in prefix {
            node = *self.nodes[node].children.get(ch)?;
        }
        Some(node)
    }

    fn excluded_hash(&self, node: NodeId, taken: u8) -> (Hash160, usize) {
        let mut items = 0;
        let siblings: Vec<&[u8]> = self.nodes[node]
            .children
            .iter()
            .filter(|(ch, _)| **ch != taken)
            .map(|(_, &child)| {
                items += self.nodes[child].items;
                &self.nodes[child].hash[..]
            })
            .collect();
        (blake3_160_multi(siblings), items)
    }

    /// Turn a keyed leaf at `depth` into an internal node whose only child
    /// holds the key one level down.
    fn split_leaf(&mut self, node: NodeId, depth: usize) {
        let Some(existing) = self.nodes[node].key.take() else {
            return;
        };
        let Some(&ch) = existing.as_bytes().get(depth) else {
            self.nodes[node].key = Some(existing);
            return;
        };
        let child = self.alloc();
        let leaf = &mut self.nodes[child];
        leaf.hash = blake3_160(existing.as_bytes());
        leaf.items = 1;
        leaf.key = Some(existing);
        self.nodes[node].children.insert(ch, child);
    }

    /// Below the timestamp depth, a node left with one record must be the
    /// leaf holding it.
    fn pull_up_only_child(&mut self, parent: NodeId) {
        let Some((&ch, &only)) = self.nodes[parent].children.iter().next() else {
            return;
        };
        if self.nodes[only].key.is_none() {
            return;
        }
        let key = self.nodes[only].key.take();
        self.nodes[parent].children.remove(&ch);
        self.nodes[parent].key = key;
        self.release(only);
    }

    fn update_hash(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        let hash = if node.is_leaf() {
            match &node.key {
                Some(key) => blake3_160(key.as_bytes()),
                None => empty_hash(),
            }
        } else {
            blake3_160_multi(node.children.values().map(|&c| &self.nodes[c].hash[..]))
        };
        self.nodes[id].hash = hash;
    }

    fn alloc(&mut self) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = TrieNode::new();
                id
            }
            None => {
                self.nodes.push(TrieNode::new());
                self.nodes.len() - 1
            }
        }
    }

    /// Free a node and everything still hanging below it.
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = std::mem::replace(&mut self.nodes[id], TrieNode::new());
            stack.extend(node.children.into_values());
            self.free.push(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
