// Sync trie and merge-path benchmarks for the Hub.
//
// Covers trie insertion at various sizes, snapshot and divergence queries
// against a populated trie, and end-to-end message submission through the
// stores and the trie mirror.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use hub_protocol::message::{CastAddBody, Message, MessageBody, MessageData, SignerBody};
use hub_protocol::storage::{Engine, HubDb, StoreConfig};
use hub_protocol::sync::{timestamp_prefix, MerkleTrie, SyncConfig, SyncEngine, SyncId};

const SIGNER: [u8; 32] = [0x42; 32];

fn ids(count: u32) -> Vec<SyncId> {
    (0..count)
        .map(|i| {
            let hash = *blake3::hash(&i.to_be_bytes()).as_bytes();
            let mut short = [0u8; 20];
            short.copy_from_slice(&hash[..20]);
            SyncId::new(1_000_000 + i * 7, &short)
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

fn cast(i: u32) -> Message {
    Message::new(
        MessageData {
            fid: 1,
            timestamp: 1_000 + i,
            body: MessageBody::CastAdd(CastAddBody {
                text: format!("cast number {}", i),
                embeds: Vec::new(),
                mentions: Vec::new(),
                parent: None,
            }),
        },
        SIGNER,
    )
    .unwrap()
}

fn hub_engine() -> SyncEngine {
    let db = Arc::new(HubDb::open_temporary().unwrap());
    let engine = Arc::new(Engine::new(db, &StoreConfig::default()));
    let sync = SyncEngine::new(engine, SyncConfig::default());
    let grant = Message::new(
        MessageData {
            fid: 1,
            timestamp: 1,
            body: MessageBody::SignerAdd(SignerBody { signer: SIGNER }),
        },
        [0x01; 32],
    )
    .unwrap();
    sync.submit_message(&grant).unwrap();
    sync
}

fn bench_trie_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("trie/insert");

    for size in [100u32, 1_000, 10_000] {
        let ids = ids(size);
        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| trie_of(ids));
        });
    }

    group.finish();
}

fn bench_trie_delete(c: &mut Criterion) {
    let ids = ids(1_000);
    c.bench_function("trie/delete_1000", |b| {
        b.iter_batched(
            || trie_of(&ids),
            |mut trie| {
                for id in &ids {
                    trie.delete(id);
                }
                trie
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let trie = trie_of(&ids(10_000));
    let prefix = timestamp_prefix(1_050_000);

    c.bench_function("trie/snapshot", |b| {
        b.iter(|| trie.get_snapshot(&prefix));
    });

    let theirs = trie_of(&ids(9_990)).get_snapshot(&prefix);
    c.bench_function("trie/divergence_prefix", |b| {
        b.iter(|| trie.get_divergence_prefix(&prefix, &theirs.excluded_hashes));
    });
}

fn bench_submit(c: &mut Criterion) {
    let messages: Vec<Message> = (0..200).map(cast).collect();
    let mut group = c.benchmark_group("sync_engine/submit");
    group.throughput(Throughput::Elements(messages.len() as u64));
    group.sample_size(10);
    group.bench_function("casts_200", |b| {
        b.iter_batched(
            hub_engine,
            |sync| {
                for m in &messages {
                    sync.submit_message(m).unwrap();
                }
                sync
            },
            BatchSize::PerIteration,
        );
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_trie_insert,
    bench_trie_delete,
    bench_snapshot,
    bench_submit,
);
criterion_main!(benches);
