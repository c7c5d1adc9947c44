// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! RocksDB-backed key record store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{
    DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, SnapshotWithThreadMode,
    WriteBatch, WriteOptions,
};

use crate::algorithm::AlgorithmType;

use super::key::{
    archive_ref_prefix, decode_archive_ref_key, decode_index_key, encode_archive_ref_key,
    encode_index_key, encode_record_key, index_prefix,
};
use super::{archived_row, KeyRecord, KeyRecordStore, RecordId, StoreError};

/// Durability mode for write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Writes are synced to WAL but not fsynced to disk.
    /// Durable against process crashes but not power failures.
    WalOnly,
    /// Writes are fsynced to disk on every operation.
    ///
    /// The default: losing an archived legacy key to a power cut would leave
    /// data encrypted under it unrecoverable.
    #[default]
    FsyncEveryWrite,
}

type Db = DBWithThreadMode<MultiThreaded>;
type Snapshot<'a> = SnapshotWithThreadMode<'a, Db>;

/// RocksDB-backed key record store.
///
/// Rows are stored as JSON. Each write is a single `WriteBatch` that updates
/// the row together with its algorithm index entry, so the index never points
/// at a row on a different algorithm. Scans read through a snapshot so the
/// index and the rows come from the same point in time.
///
/// RocksDB calls block, so every trait method runs on the blocking pool and
/// callers' timeouts stay effective.
#[derive(Clone)]
pub struct RocksKeyStore {
    inner: Arc<RocksInner>,
}

struct RocksInner {
    db: Db,
    write_opts: WriteOptions,
    /// Serializes read-compare-write sequences.
    write_lock: Mutex<()>,
}

impl RocksKeyStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_durability(path, DurabilityMode::default())
    }

    /// Opens or creates a store with the specified durability mode.
    pub fn open_with_durability(
        path: &Path,
        durability: DurabilityMode,
    ) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(16 * 1024 * 1024);
        opts.set_level_compaction_dynamic_level_bytes(true);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);

        let db = DBWithThreadMode::open(&opts, path)?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(durability == DurabilityMode::FsyncEveryWrite);

        Ok(Self {
            inner: Arc::new(RocksInner {
                db,
                write_opts,
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// Forces a flush of memtables to disk.
    pub fn sync(&self) -> Result<(), StoreError> {
        self.inner.db.flush()?;
        Ok(())
    }

    async fn blocking<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&RocksInner) -> Result<T, StoreError> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .unwrap_or_else(|e| Err(StoreError::Unavailable(format!("{op} task failed: {e}"))))
    }
}

impl RocksInner {
    fn get_row(&self, id: &RecordId) -> Result<Option<KeyRecord>, StoreError> {
        match self.db.get(encode_record_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_row_at(snapshot: &Snapshot<'_>, id: &RecordId) -> Result<Option<KeyRecord>, StoreError> {
        match snapshot.get(encode_record_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Adds the row write and its index entry to `batch`.
    fn put_row(batch: &mut WriteBatch, record: &KeyRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        batch.put(encode_record_key(&record.id), bytes);
        if !record.is_archived() {
            batch.put(
                encode_index_key(record.algorithm_spec.algorithm_type, &record.id),
                [],
            );
        }
        Ok(())
    }

    /// Collects every key under `prefix`, in order, starting at `from`.
    fn keys_with_prefix(
        snapshot: &Snapshot<'_>,
        prefix: &[u8],
        from: &[u8],
        limit: usize,
    ) -> Result<Vec<Box<[u8]>>, StoreError> {
        let mut keys = Vec::with_capacity(limit.min(1024));
        let iter = snapshot.iterator(IteratorMode::From(from, Direction::Forward));

        for item in iter {
            if keys.len() >= limit {
                break;
            }
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key);
        }

        Ok(keys)
    }

    fn scan(
        &self,
        algorithm: AlgorithmType,
        after: Option<&RecordId>,
        limit: usize,
    ) -> Result<Vec<KeyRecord>, StoreError> {
        let snapshot = self.db.snapshot();
        Self::scan_at(&snapshot, algorithm, after, limit)
    }

    fn scan_at(
        snapshot: &Snapshot<'_>,
        algorithm: AlgorithmType,
        after: Option<&RecordId>,
        limit: usize,
    ) -> Result<Vec<KeyRecord>, StoreError> {
        let prefix = index_prefix(algorithm);
        let start = match after {
            // Appending a zero byte yields the smallest key strictly after the cursor.
            Some(id) => {
                let mut key = encode_index_key(algorithm, id);
                key.push(0);
                key
            }
            None => prefix.clone(),
        };

        let mut records = Vec::new();
        for key in Self::keys_with_prefix(snapshot, &prefix, &start, limit)? {
            let (_, id) = decode_index_key(&key)?;
            match Self::get_row_at(snapshot, &id)? {
                Some(record)
                    if !record.is_archived()
                        && record.algorithm_spec.algorithm_type == algorithm =>
                {
                    records.push(record)
                }
                Some(_) => {
                    return Err(StoreError::Corruption(format!(
                        "index entry for {} does not match its row",
                        id
                    )))
                }
                None => {
                    return Err(StoreError::Corruption(format!(
                        "index entry for missing row {}",
                        id
                    )))
                }
            }
        }

        Ok(records)
    }

    fn update(
        &self,
        id: &RecordId,
        expected_version: u64,
        mut new_record: KeyRecord,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();

        let current = self
            .get_row(id)?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: id.clone(),
                expected: expected_version,
                actual: current.version,
            });
        }

        new_record.id = id.clone();

        let mut batch = WriteBatch::default();
        if !current.is_archived() {
            batch.delete(encode_index_key(current.algorithm_spec.algorithm_type, id));
        }
        Self::put_row(&mut batch, &new_record)?;
        self.db.write_opt(batch, &self.write_opts)?;

        Ok(())
    }

    fn archive(&self, id: &RecordId, old_record: KeyRecord) -> Result<RecordId, StoreError> {
        let row = archived_row(id, old_record);
        let archive_id = row.id.clone();

        let _guard = self.write_lock.lock();
        if self.get_row(&archive_id)?.is_some() {
            return Err(StoreError::AlreadyExists(archive_id));
        }

        let mut batch = WriteBatch::default();
        Self::put_row(&mut batch, &row)?;
        batch.put(encode_archive_ref_key(id, &archive_id), []);
        self.db.write_opt(batch, &self.write_opts)?;

        Ok(archive_id)
    }

    fn insert(&self, record: KeyRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        if self.get_row(&record.id)?.is_some() {
            return Err(StoreError::AlreadyExists(record.id));
        }

        let mut batch = WriteBatch::default();
        Self::put_row(&mut batch, &record)?;
        if let Some(original) = record.archived_from.as_ref().filter(|_| record.is_archived()) {
            batch.put(encode_archive_ref_key(original, &record.id), []);
        }
        self.db.write_opt(batch, &self.write_opts)?;

        Ok(())
    }

    fn archives_of(&self, id: &RecordId) -> Result<Vec<KeyRecord>, StoreError> {
        let snapshot = self.db.snapshot();
        let prefix = archive_ref_prefix(id);
        let mut archives = Vec::new();

        for key in Self::keys_with_prefix(&snapshot, &prefix, &prefix, usize::MAX)? {
            let archive_id = decode_archive_ref_key(&key)?;
            if let Some(row) = Self::get_row_at(&snapshot, &archive_id)? {
                archives.push(row);
            }
        }

        Ok(archives)
    }
}

#[async_trait]
impl KeyRecordStore for RocksKeyStore {
    async fn scan(
        &self,
        algorithm: AlgorithmType,
        after: Option<&RecordId>,
        limit: usize,
    ) -> Result<Vec<KeyRecord>, StoreError> {
        let after = after.cloned();
        self.blocking("scan", move |db| db.scan(algorithm, after.as_ref(), limit))
            .await
    }

    async fn read(&self, id: &RecordId) -> Result<KeyRecord, StoreError> {
        let id = id.clone();
        self.blocking("read", move |db| {
            db.get_row(&id)?.ok_or_else(|| StoreError::NotFound(id.clone()))
        })
        .await
    }

    async fn update(
        &self,
        id: &RecordId,
        expected_version: u64,
        new_record: KeyRecord,
    ) -> Result<(), StoreError> {
        let id = id.clone();
        self.blocking("update", move |db| db.update(&id, expected_version, new_record))
            .await
    }

    async fn archive(
        &self,
        id: &RecordId,
        old_record: KeyRecord,
    ) -> Result<RecordId, StoreError> {
        let id = id.clone();
        self.blocking("archive", move |db| db.archive(&id, old_record))
            .await
    }

    async fn insert(&self, record: KeyRecord) -> Result<(), StoreError> {
        self.blocking("insert", move |db| db.insert(record)).await
    }

    async fn archives_of(&self, id: &RecordId) -> Result<Vec<KeyRecord>, StoreError> {
        let id = id.clone();
        self.blocking("archives_of", move |db| db.archives_of(&id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::AlgorithmSpec;
    use crate::store::KeyStatus;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksKeyStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksKeyStore::open_with_durability(dir.path(), DurabilityMode::WalOnly).unwrap();
        (store, dir)
    }

    fn rsa_record(id: &str) -> KeyRecord {
        KeyRecord::new(id, vec![7; 256], vec![9; 48], AlgorithmSpec::rsa2048())
    }

    #[tokio::test]
    async fn test_insert_and_read() {
        let (store, _dir) = create_test_store();
        let record = rsa_record("k1");
        store.insert(record.clone()).await.unwrap();

        assert_eq!(store.read(&record.id).await.unwrap(), record);
        assert!(matches!(
            store.read(&"missing".into()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_scan_follows_index_and_cursor() {
        let (store, _dir) = create_test_store();
        for i in 0..6 {
            store.insert(rsa_record(&format!("k{}", i))).await.unwrap();
        }
        store
            .insert(KeyRecord::new(
                "e1",
                vec![],
                vec![],
                AlgorithmSpec::ecdsa_p256(),
            ))
            .await
            .unwrap();

        let first = store.scan(AlgorithmType::Rsa2048, None, 4).await.unwrap();
        assert_eq!(first.len(), 4);

        let rest = store
            .scan(AlgorithmType::Rsa2048, Some(&first[3].id), 10)
            .await
            .unwrap();
        assert_eq!(rest.len(), 2);

        let ecdsa = store.scan(AlgorithmType::EcdsaP256, None, 10).await.unwrap();
        assert_eq!(ecdsa.len(), 1);
    }

    #[tokio::test]
    async fn test_update_moves_index_entry() {
        let (store, _dir) = create_test_store();
        let record = rsa_record("k1");
        store.insert(record.clone()).await.unwrap();

        let migrated = KeyRecord {
            algorithm_spec: AlgorithmSpec::hybrid_kyber768(),
            version: 2,
            status: KeyStatus::Migrated,
            ..record.clone()
        };
        store.update(&record.id, 1, migrated).await.unwrap();

        assert!(store
            .scan(AlgorithmType::Rsa2048, None, 10)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .scan(AlgorithmType::HybridKyber768, None, 10)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected() {
        let (store, _dir) = create_test_store();
        let record = rsa_record("k1");
        store.insert(record.clone()).await.unwrap();

        let next = KeyRecord {
            version: 2,
            ..record.clone()
        };
        store.update(&record.id, 1, next.clone()).await.unwrap();

        let err = store.update(&record.id, 1, next).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { actual: 2, .. }));
    }

    #[tokio::test]
    async fn test_archive_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let record = rsa_record("k1");
        let archive_id = {
            let store = RocksKeyStore::open(dir.path()).unwrap();
            store.insert(record.clone()).await.unwrap();
            store.archive(&record.id, record.clone()).await.unwrap()
        };

        let store = RocksKeyStore::open(dir.path()).unwrap();
        let archives = store.archives_of(&record.id).await.unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].id, archive_id);
        assert_eq!(archives[0].status, KeyStatus::Archived);
        assert_eq!(archives[0].encrypted_private_key, record.encrypted_private_key);

        // Archived rows never appear as legacy work.
        let scanned = store.scan(AlgorithmType::Rsa2048, None, 10).await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].id, record.id);
    }
    #[tokio::test]
    async fn test_scan_reads_one_point_in_time() {
        let (store, _dir) = create_test_store();
        let record = rsa_record("k1");
        store.insert(record.clone()).await.unwrap();

        let snapshot = store.inner.db.snapshot();
        let rewritten = KeyRecord {
            algorithm_spec: AlgorithmSpec::ecdsa_p256(),
            version: 2,
            ..record.clone()
        };
        store.update(&record.id, 1, rewritten).await.unwrap();

        // The snapshot still pairs the old index entry with the old row.
        let seen = RocksInner::scan_at(&snapshot, AlgorithmType::Rsa2048, None, 10).unwrap();
        assert_eq!(seen, vec![record.clone()]);

        assert!(store
            .scan(AlgorithmType::Rsa2048, None, 10)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store.scan(AlgorithmType::EcdsaP256, None, 10).await.unwrap()[0].version,
            2
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writes_through_blocking_pool() {
        let (store, _dir) = create_test_store();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(rsa_record(&format!("k{:02}", i))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(
            store.scan(AlgorithmType::Rsa2048, None, 100).await.unwrap().len(),
            16
        );
    }
}
