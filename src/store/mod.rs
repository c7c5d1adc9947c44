// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Durable key record storage with optimistic concurrency.
//!
//! Every operation is atomic for a single record. There are no multi-record
//! transactions: batch-level consistency is the migration orchestrator's job.
//!
//! # Versioning
//!
//! Writers supply the version they read. If the stored version differs the
//! write fails with [`StoreError::VersionConflict`] and nothing is written:
//!
//! ```text
//!   read(id)            -> v3
//!   update(id, v3, ..)  -> ok, stored v4
//!   update(id, v3, ..)  -> VersionConflict { expected: 3, actual: 4 }
//! ```
//!
//! # Archival
//!
//! `archive` never overwrites. It inserts a fresh `Archived` row whose
//! `archived_from` points back at the original id. Archived rows are not
//! returned by `scan`.
//!
//! # Example
//!
//! ```rust,no_run
//! use keymigrate::algorithm::{AlgorithmSpec, AlgorithmType};
//! use keymigrate::store::{KeyRecord, KeyRecordStore, MemoryKeyStore};
//!
//! # async fn example() -> Result<(), keymigrate::store::StoreError> {
//! let store = MemoryKeyStore::new();
//! store.insert(KeyRecord::new("k1", vec![0; 256], vec![1; 64], AlgorithmSpec::rsa2048())).await?;
//!
//! let page = store.scan(AlgorithmType::Rsa2048, None, 100).await?;
//! assert_eq!(page.len(), 1);
//! # Ok(())
//! # }
//! ```

mod error;
mod key;
mod memory;
mod record;
mod rocks;

pub use error::StoreError;
pub use key::{
    archive_ref_prefix, decode_archive_ref_key, decode_index_key, encode_archive_ref_key,
    encode_index_key, encode_record_key, index_prefix,
};
pub use memory::MemoryKeyStore;
pub use record::{now_millis, KeyRecord, KeyStatus, RecordId};
pub use rocks::{DurabilityMode, RocksKeyStore};

use async_trait::async_trait;

use crate::algorithm::AlgorithmType;

/// Durable, transactional storage of key records.
#[async_trait]
pub trait KeyRecordStore: Send + Sync {
    /// Returns up to `limit` non-archived records on `algorithm`, ordered by
    /// id, with ids strictly greater than `after`.
    async fn scan(
        &self,
        algorithm: AlgorithmType,
        after: Option<&RecordId>,
        limit: usize,
    ) -> Result<Vec<KeyRecord>, StoreError>;

    /// Reads a record (active or archived) by id.
    async fn read(&self, id: &RecordId) -> Result<KeyRecord, StoreError>;

    /// Replaces the record if its stored version equals `expected_version`.
    ///
    /// `new_record` is stored as given, including its version.
    async fn update(
        &self,
        id: &RecordId,
        expected_version: u64,
        new_record: KeyRecord,
    ) -> Result<(), StoreError>;

    /// Appends `old_record` as an `Archived` row referencing `id`.
    ///
    /// Returns the id of the new archived row.
    async fn archive(&self, id: &RecordId, old_record: KeyRecord)
        -> Result<RecordId, StoreError>;

    /// Inserts a new record. Fails if the id is taken.
    async fn insert(&self, record: KeyRecord) -> Result<(), StoreError>;

    /// Returns every archived row whose `archived_from` is `id`.
    async fn archives_of(&self, id: &RecordId) -> Result<Vec<KeyRecord>, StoreError>;
}

/// Builds the row written by [`KeyRecordStore::archive`].
pub(crate) fn archived_row(id: &RecordId, old_record: KeyRecord) -> KeyRecord {
    KeyRecord {
        id: RecordId::generate(),
        status: KeyStatus::Archived,
        archived_from: Some(id.clone()),
        ..old_record
    }
}
