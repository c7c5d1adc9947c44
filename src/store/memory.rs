// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory key record store.
//!
//! Suitable for tests and for dry runs against an exported inventory.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::algorithm::AlgorithmType;

use super::{archived_row, KeyRecord, KeyRecordStore, RecordId, StoreError};

/// A [`KeyRecordStore`] backed by an ordered map.
///
/// Active and archived rows share one id space.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    rows: RwLock<BTreeMap<RecordId, KeyRecord>>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rows, archived ones included.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Returns a copy of every row.
    pub fn snapshot(&self) -> Vec<KeyRecord> {
        self.rows.read().values().cloned().collect()
    }
}

#[async_trait]
impl KeyRecordStore for MemoryKeyStore {
    async fn scan(
        &self,
        algorithm: AlgorithmType,
        after: Option<&RecordId>,
        limit: usize,
    ) -> Result<Vec<KeyRecord>, StoreError> {
        let rows = self.rows.read();
        let lower = match after {
            Some(id) => Bound::Excluded(id.clone()),
            None => Bound::Unbounded,
        };

        Ok(rows
            .range((lower, Bound::Unbounded))
            .map(|(_, record)| record)
            .filter(|r| !r.is_archived() && r.algorithm_spec.algorithm_type == algorithm)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn read(&self, id: &RecordId) -> Result<KeyRecord, StoreError> {
        self.rows
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn update(
        &self,
        id: &RecordId,
        expected_version: u64,
        mut new_record: KeyRecord,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        let current = rows
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: id.clone(),
                expected: expected_version,
                actual: current.version,
            });
        }

        new_record.id = id.clone();
        *current = new_record;
        Ok(())
    }

    async fn archive(
        &self,
        id: &RecordId,
        old_record: KeyRecord,
    ) -> Result<RecordId, StoreError> {
        let row = archived_row(id, old_record);
        let archive_id = row.id.clone();

        let mut rows = self.rows.write();
        if rows.contains_key(&archive_id) {
            return Err(StoreError::AlreadyExists(archive_id));
        }
        rows.insert(archive_id.clone(), row);
        Ok(archive_id)
    }

    async fn insert(&self, record: KeyRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        if rows.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        rows.insert(record.id.clone(), record);
        Ok(())
    }

    async fn archives_of(&self, id: &RecordId) -> Result<Vec<KeyRecord>, StoreError> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|r| r.is_archived() && r.archived_from.as_ref() == Some(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::AlgorithmSpec;
    use crate::store::KeyStatus;

    fn rsa_record(id: &str) -> KeyRecord {
        KeyRecord::new(id, vec![1; 4], vec![2; 4], AlgorithmSpec::rsa2048())
    }

    #[tokio::test]
    async fn test_scan_pages_by_cursor() {
        let store = MemoryKeyStore::new();
        for i in 0..5 {
            store.insert(rsa_record(&format!("k{}", i))).await.unwrap();
        }
        store
            .insert(KeyRecord::new(
                "other",
                vec![],
                vec![],
                AlgorithmSpec::ecdsa_p256(),
            ))
            .await
            .unwrap();

        let first = store.scan(AlgorithmType::Rsa2048, None, 2).await.unwrap();
        assert_eq!(first.len(), 2);

        let rest = store
            .scan(AlgorithmType::Rsa2048, Some(&first[1].id), 10)
            .await
            .unwrap();
        assert_eq!(rest.len(), 3);
        assert!(rest.iter().all(|r| r.id > first[1].id));
    }

    #[tokio::test]
    async fn test_update_checks_version() {
        let store = MemoryKeyStore::new();
        store.insert(rsa_record("k1")).await.unwrap();

        let mut next = rsa_record("k1");
        next.version = 2;
        store.update(&"k1".into(), 1, next.clone()).await.unwrap();

        let err = store.update(&"k1".into(), 1, next).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryKeyStore::new();
        let err = store
            .update(&"nope".into(), 1, rsa_record("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_archive_appends_and_hides_from_scan() {
        let store = MemoryKeyStore::new();
        let record = rsa_record("k1");
        store.insert(record.clone()).await.unwrap();

        let archive_id = store.archive(&record.id, record.clone()).await.unwrap();
        assert_ne!(archive_id, record.id);

        let archived = store.read(&archive_id).await.unwrap();
        assert_eq!(archived.status, KeyStatus::Archived);
        assert_eq!(archived.archived_from, Some(record.id.clone()));

        let scanned = store.scan(AlgorithmType::Rsa2048, None, 10).await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(store.archives_of(&record.id).await.unwrap().len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_duplicate() {
        let store = MemoryKeyStore::new();
        store.insert(rsa_record("k1")).await.unwrap();
        let err = store.insert(rsa_record("k1")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::algorithm::AlgorithmSpec;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn only_matching_version_wins(
            expectations in prop::collection::vec(0u64..6, 1..20),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryKeyStore::new();
                let id = RecordId::new("k");
                store
                    .insert(KeyRecord::new("k", vec![], vec![], AlgorithmSpec::rsa2048()))
                    .await
                    .unwrap();

                let mut version = 1u64;
                for expected in expectations {
                    let mut next = store.read(&id).await.unwrap();
                    next.version = version + 1;
                    let result = store.update(&id, expected, next).await;

                    if expected == version {
                        assert!(result.is_ok());
                        version += 1;
                    } else {
                        assert!(matches!(result, Err(StoreError::VersionConflict { .. })), "stale write accepted");
                    }
                    assert_eq!(store.read(&id).await.unwrap().version, version);
                }
            });
        }
    }
}
