//! # HubDb: Persistent Key-Value Store
//!
//! The persistence collaborator for every CRDT store, built on sled's
//! embedded key-value engine. The stores only need five things from it:
//! point get / put / delete, ordered prefix iteration, and atomic batches.
//!
//! ## Keyspace
//!
//! Everything lives in one sled tree named `hub`. Keys are byte strings
//! built by `storage::keys`, whose first byte (the root prefix) separates
//! per-user data from the global secondary indices. sled orders keys
//! lexicographically, so big-endian integers and sync ids inside keys
//! iterate in numeric and chronological order.
//!
//! ## Atomicity
//!
//! A merge touches the primary record, the winner index, the by-signer
//! index and any secondary index in one `WriteBatch`. sled applies a batch
//! atomically: readers see all of it or none of it.

use sled::{Batch, Db, IVec, Tree};
use std::path::Path;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// WriteBatch
// ---------------------------------------------------------------------------

/// A set of writes applied atomically by `HubDb::commit`.
#[derive(Debug, Default)]
pub struct WriteBatch {
    inner: Batch,
    ops: usize,
}

impl WriteBatch {
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        self.inner.insert(key.as_ref(), value.as_ref());
        self.ops += 1;
    }

    pub fn delete(&mut self, key: impl AsRef<[u8]>) {
        self.inner.remove(key.as_ref());
        self.ops += 1;
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops == 0
    }
}

// ---------------------------------------------------------------------------
// Iteration
// ---------------------------------------------------------------------------

/// Options for `HubDb::iterate_prefix`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterateOptions {
    /// Walk from the highest key down.
    pub reverse: bool,
    /// Stop after this many entries.
    pub limit: Option<usize>,
}

impl IterateOptions {
    pub fn reverse() -> Self {
        Self {
            reverse: true,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ---------------------------------------------------------------------------
// HubDb
// ---------------------------------------------------------------------------

/// Persistent storage engine for a Hub.
///
/// # Thread Safety
///
/// sled trees support lock-free concurrent reads and serialized writes.
/// `HubDb` can be shared across threads via `Arc<HubDb>` without external
/// synchronization; read-compare-write sequences are serialized one level
/// up, by the stores.
#[derive(Debug, Clone)]
pub struct HubDb {
    db: Db,
    tree: Tree,
}

impl HubDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    ///
    /// Used by unit tests.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let tree = db.open_tree("hub")?;
        Ok(Self { db, tree })
    }

    // -- Point operations ---------------------------------------------------

    pub fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    pub fn delete(&self, key: &[u8]) -> DbResult<()> {
        self.tree.remove(key)?;
        Ok(())
    }

    // -- Batches ------------------------------------------------------------

    /// Start an empty batch.
    pub fn transaction(&self) -> WriteBatch {
        WriteBatch::default()
    }

    /// Apply every write in `batch` atomically.
    pub fn commit(&self, batch: WriteBatch) -> DbResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.tree.apply_batch(batch.inner)?;
        Ok(())
    }

    // -- Iteration ----------------------------------------------------------

    /// Lazily iterate all entries whose key starts with `prefix`, in key
    /// order (or reverse key order). Each call starts a fresh iterator.
    pub fn iterate_prefix(
        &self,
        prefix: &[u8],
        options: IterateOptions,
    ) -> impl Iterator<Item = DbResult<(Vec<u8>, Vec<u8>)>> {
        let scan = self.tree.scan_prefix(prefix);
        let ordered: Box<dyn Iterator<Item = sled::Result<(IVec, IVec)>>> = if options.reverse {
            Box::new(scan.rev())
        } else {
            Box::new(scan)
        };
        ordered
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|entry| {
                entry
                    .map(|(k, v)| (k.to_vec(), v.to_vec()))
                    .map_err(DbError::from)
            })
    }

    // -- Utility ------------------------------------------------------------

    /// Number of keys in the store, indices included.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Helpers ------------------------------------------------------------

    fn seeded() -> HubDb {
        let db = HubDb::open_temporary().unwrap();
        for (k, v) in [
            (&b"a1"[..], &b"1"[..]),
            (b"a2", b"2"),
            (b"a3", b"3"),
            (b"b1", b"4"),
        ] {
            db.put(k, v).unwrap();
        }
        db
    }

    fn keys(db: &HubDb, prefix: &[u8], options: IterateOptions) -> Vec<Vec<u8>> {
        db.iterate_prefix(prefix, options)
            .map(|r| r.unwrap().0)
            .collect()
    }

    // -- Tests --------------------------------------------------------------

    #[test]
    fn open_temporary_database() {
        let db = HubDb::open_temporary().expect("should create temp db");
        assert!(db.is_empty());
    }

    #[test]
    fn open_persistent_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = HubDb::open(dir.path()).expect("should open db");
        db.put(b"k", b"v").unwrap();
        db.flush().unwrap();
        drop(db);

        let db2 = HubDb::open(dir.path()).expect("should reopen db");
        assert_eq!(db2.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn point_operations() {
        let db = HubDb::open_temporary().unwrap();
        assert_eq!(db.get(b"missing").unwrap(), None);
        db.put(b"k", b"v1").unwrap();
        db.put(b"k", b"v2").unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v2".to_vec()));
        db.delete(b"k").unwrap();
        assert_eq!(db.get(b"k").unwrap(), None);
        // Deleting a missing key is not an error.
        db.delete(b"k").unwrap();
    }

    #[test]
    fn prefix_iteration_in_key_order() {
        let db = seeded();
        assert_eq!(
            keys(&db, b"a", IterateOptions::default()),
            vec![b"a1".to_vec(), b"a2".to_vec(), b"a3".to_vec()]
        );
    }

    #[test]
    fn prefix_iteration_reverse_with_limit() {
        let db = seeded();
        assert_eq!(
            keys(&db, b"a", IterateOptions::reverse().with_limit(2)),
            vec![b"a3".to_vec(), b"a2".to_vec()]
        );
        assert_eq!(keys(&db, b"c", IterateOptions::default()).len(), 0);
    }

    #[test]
    fn batch_commits_atomically() {
        let db = seeded();
        let mut batch = db.transaction();
        batch.delete(b"a1");
        batch.put(b"a4", b"5");
        batch.put(b"c1", b"6");
        assert_eq!(batch.len(), 3);
        db.commit(batch).unwrap();

        assert_eq!(db.get(b"a1").unwrap(), None);
        assert_eq!(db.get(b"a4").unwrap(), Some(b"5".to_vec()));
        assert_eq!(db.len(), 5);
    }

    #[test]
    fn empty_batch_is_noop() {
        let db = seeded();
        db.commit(db.transaction()).unwrap();
        assert_eq!(db.len(), 4);
    }

    #[test]
    fn concurrent_reads_do_not_block() {
        use std::sync::Arc;
        use std::thread;

        let db = Arc::new(seeded());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    assert_eq!(db.get(b"a2").unwrap(), Some(b"2".to_vec()));
                    db.iterate_prefix(b"a", IterateOptions::default()).count()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().expect("reader thread should not panic"), 3);
        }
    }
}
