//! Convergence properties of the trie and the CRDT stores.
//!
//! Every test here replays the same inputs in several orders and checks that
//! the resulting state does not depend on the order. Shuffles use seeded
//! `StdRng`s so failures are reproducible.

mod common;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use hub_protocol::message::{Fid, Message};
use hub_protocol::storage::stores::{message_compare, FollowStore};
use hub_protocol::storage::{Engine, HubDb, StoreConfig};
use hub_protocol::sync::{MerkleTrie, SyncId};
use hub_protocol::HubError;

use common::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn random_ids(rng: &mut StdRng, count: usize) -> Vec<SyncId> {
    (0..count)
        .map(|_| {
            let mut hash = [0u8; 20];
            rng.fill(&mut hash);
            SyncId::new(rng.gen_range(0..5_000), &hash)
        })
        .collect()
}

fn trie_of(ids: &[SyncId]) -> MerkleTrie {
    let mut trie = MerkleTrie::new();
    for id in ids {
        trie.insert(id);
    }
    trie
}

/// Every prefix of every id, each paired with the node metadata there.
fn assert_same_nodes(a: &MerkleTrie, b: &MerkleTrie, ids: &[SyncId]) {
    for id in ids {
        for len in 0..=id.as_bytes().len() {
            let prefix = &id.as_bytes()[..len];
            assert_eq!(
                a.get_node_metadata(prefix),
                b.get_node_metadata(prefix),
                "node metadata differs at {:?}",
                String::from_utf8_lossy(prefix)
            );
        }
    }
}

fn engine() -> Engine {
    engine_with(StoreConfig::default())
}

fn engine_with(config: StoreConfig) -> Engine {
    let db = Arc::new(HubDb::open_temporary().expect("temp db"));
    let engine = Engine::new(db, &config);
    engine.merge_message(&grant(1, 1)).expect("grant merges");
    engine
}

fn merge_ignoring_rejections(engine: &Engine, messages: &[Message]) {
    for m in messages {
        let _ = engine.merge_message(m);
    }
}

fn sorted_ids(messages: Vec<Message>) -> Vec<SyncId> {
    let mut ids: Vec<SyncId> = messages.iter().map(SyncId::from_message).collect();
    ids.sort();
    ids
}

// ---------------------------------------------------------------------------
// Trie
// ---------------------------------------------------------------------------

#[test]
fn insert_then_delete_is_identity() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let base = random_ids(&mut rng, 40);
        let extra = random_ids(&mut rng, 1).remove(0);

        let expected = trie_of(&base);
        let mut trie = trie_of(&base);
        assert!(trie.insert(&extra));
        assert!(trie.delete(&extra));

        assert_eq!(trie.root_hash(), expected.root_hash());
        assert_eq!(trie.items(), expected.items());
        assert_eq!(trie.node_count(), expected.node_count());
        let mut probes = base.clone();
        probes.push(extra);
        assert_same_nodes(&trie, &expected, &probes);
    }
}

#[test]
fn insertion_order_does_not_matter() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut ids = random_ids(&mut rng, 200);
    let reference = trie_of(&ids);

    for _ in 0..5 {
        ids.shuffle(&mut rng);
        let trie = trie_of(&ids);
        assert_eq!(trie.root_hash(), reference.root_hash());
        assert_eq!(trie.items(), reference.items());
    }
}

#[test]
fn repeated_insert_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(13);
    let ids = random_ids(&mut rng, 50);
    let mut trie = trie_of(&ids);
    let root = trie.root_hash();
    for id in &ids {
        assert!(!trie.insert(id));
    }
    assert_eq!(trie.root_hash(), root);
    assert_eq!(trie.items(), 50);
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

#[test]
fn merge_order_does_not_change_winners() {
    let mut rng = StdRng::seed_from_u64(17);
    let mut messages: Vec<Message> = (0..60)
        .map(|i| {
            let target: Fid = 100 + rng.gen_range(0..5);
            let ts = 1_000 + rng.gen_range(0..30);
            follow(1, ts, target, i % 2 == 0)
        })
        .collect();

    let mut in_order = messages.clone();
    in_order.sort_by(message_compare);
    let reference = engine();
    merge_ignoring_rejections(&reference, &in_order);
    let expected = sorted_ids(reference.get_all_messages().unwrap());

    for _ in 0..4 {
        messages.shuffle(&mut rng);
        let replica = engine();
        merge_ignoring_rejections(&replica, &messages);
        assert_eq!(sorted_ids(replica.get_all_messages().unwrap()), expected);
    }
}

#[test]
fn remove_wins_at_equal_timestamp() {
    let add = follow(1, 500, 2, false);
    let remove = follow(1, 500, 2, true);

    for order in [[&add, &remove], [&remove, &add]] {
        let store = FollowStore::new(Arc::new(HubDb::open_temporary().unwrap()), 100);
        for m in order {
            let _ = store.merge(m);
        }
        assert!(matches!(
            store.get_follow_add(1, 2),
            Err(HubError::NotFound(_))
        ));
        assert_eq!(store.get_follow_remove(1, 2).unwrap(), remove);
    }
}

#[test]
fn cast_remove_wins_even_when_older() {
    let gm = cast(1, 900, "gm");
    let remove = cast_remove(1, 100, gm.hash);

    for order in [[&gm, &remove], [&remove, &gm]] {
        let replica = engine();
        for m in order {
            let _ = replica.merge_message(m);
        }
        assert!(replica.casts().get_cast_add(1, &gm.hash).is_err());
        assert!(replica.casts().get_cast_remove(1, &gm.hash).is_ok());
    }
}

#[test]
fn pruning_keeps_the_newest_regardless_of_order() {
    const LIMIT: usize = 5;
    let mut rng = StdRng::seed_from_u64(23);
    let mut adds: Vec<Message> = (0..20u32)
        .map(|i| follow(1, 2_000 + rng.gen_range(0..1_000), 500 + Fid::from(i), false))
        .collect();

    let mut expected: Vec<SyncId> = adds.iter().map(SyncId::from_message).collect();
    expected.sort();
    let expected = expected.split_off(expected.len() - LIMIT);

    let config = StoreConfig {
        follow_prune_limit: LIMIT,
        ..StoreConfig::default()
    };
    for _ in 0..5 {
        adds.shuffle(&mut rng);
        let replica = engine_with(config.clone());
        merge_ignoring_rejections(&replica, &adds);
        assert_eq!(sorted_ids(replica.follows().get_adds_by_fid(1).unwrap()), expected);
    }
}

#[test]
fn explicit_prune_removes_lowest_ids() {
    let mut rng = StdRng::seed_from_u64(29);
    let db = Arc::new(HubDb::open_temporary().unwrap());
    let store = FollowStore::new(Arc::clone(&db), 1_000);
    let mut adds: Vec<Message> = (0..12u32)
        .map(|i| follow(1, 3_000 + i * 7, 900 + Fid::from(i), false))
        .collect();
    adds.shuffle(&mut rng);
    for m in &adds {
        store.merge(m).unwrap();
    }

    // Same keyspace, tighter limit.
    let limited = FollowStore::new(db, 4);
    let pruned = limited.prune_messages(1).unwrap();
    assert_eq!(pruned.len(), 8);
    let mut pruned_ts: Vec<u32> = pruned.iter().map(|e| e.message().timestamp()).collect();
    pruned_ts.sort_unstable();
    assert_eq!(pruned_ts, (0..8).map(|i| 3_000 + i * 7).collect::<Vec<_>>());
    assert_eq!(limited.get_adds_by_fid(1).unwrap().len(), 4);
    assert!(limited.prune_messages(1).unwrap().is_empty());
}
