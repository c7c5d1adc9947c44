// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for migration scenario tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use keymigrate::algorithm::{AlgorithmSpec, AlgorithmType};
use keymigrate::compliance::{
    ComplianceError, CompliancePolicy, ComplianceValidator, InventoryStats,
};
use keymigrate::crypto::{
    CapabilityTable, CryptoError, CryptoProvider, KeyPair, PublicKey, SecretKeyMaterial,
    SoftwareBackend,
};
use keymigrate::migration::CancellationToken;
use keymigrate::store::{KeyRecord, KeyRecordStore, KeyStatus, RecordId, StoreError};

/// Routes test logs through the test writer; honors `RUST_LOG`.
pub fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn provider() -> Arc<CapabilityTable> {
    Arc::new(CapabilityTable::software(
        SoftwareBackend::generate().expect("master key"),
    ))
}

pub fn key_id(i: usize) -> RecordId {
    RecordId::new(format!("key-{i:02}"))
}

/// Seeds `n` active records under `spec`, ids `key-00`, `key-01`, ...
pub async fn seed<S: KeyRecordStore>(
    store: &S,
    provider: &CapabilityTable,
    spec: &AlgorithmSpec,
    n: usize,
) -> Vec<KeyRecord> {
    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        let pair = provider.generate(spec).await.expect("generate");
        let sealed = provider.encrypt(spec, &pair.private).await.expect("seal");
        let record = KeyRecord::new(key_id(i), pair.public.bytes, sealed, spec.clone());
        store.insert(record.clone()).await.expect("insert");
        records.push(record);
    }
    records
}

/// Asserts `id` is back on its original spec and version.
pub async fn assert_untouched<S: KeyRecordStore>(store: &S, original: &KeyRecord) {
    let current = store.read(&original.id).await.expect("read");
    assert_eq!(current.algorithm_spec, original.algorithm_spec, "{}", original.id);
    assert_eq!(current.version, original.version, "{}", original.id);
    assert_eq!(current.status, KeyStatus::Active, "{}", original.id);
    assert_eq!(current.public_key, original.public_key, "{}", original.id);
}

/// Delegates to an inner store, with hooks for injecting faults.
pub struct FaultyStore<S> {
    pub inner: S,
    /// Bump this id's version just before the migrator writes it.
    pub conflict_on: Option<RecordId>,
    /// Fail the archive call with this 1-based sequence number.
    pub fail_archive_call: Option<usize>,
    /// Return every scanned record twice.
    pub duplicate_scan: bool,
    /// Cancel this token right after the n-th successful migration write.
    pub cancel_after_update: Option<(usize, CancellationToken)>,
    /// Cancel this token right after the n-th successful archive.
    pub cancel_after_archive: Option<(usize, CancellationToken)>,
    /// Delay every read once any record has been archived.
    pub slow_read_after_archive: Option<Duration>,
    /// Panic right after this id's migration write lands.
    pub panic_after_update_on: Option<RecordId>,
    archive_calls: AtomicUsize,
    archived: AtomicUsize,
    migration_writes: AtomicUsize,
}

impl<S> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            conflict_on: None,
            fail_archive_call: None,
            duplicate_scan: false,
            cancel_after_update: None,
            cancel_after_archive: None,
            slow_read_after_archive: None,
            panic_after_update_on: None,
            archive_calls: AtomicUsize::new(0),
            archived: AtomicUsize::new(0),
            migration_writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<S: KeyRecordStore> KeyRecordStore for FaultyStore<S> {
    async fn scan(
        &self,
        algorithm: AlgorithmType,
        after: Option<&RecordId>,
        limit: usize,
    ) -> Result<Vec<KeyRecord>, StoreError> {
        let page = self.inner.scan(algorithm, after, limit).await?;
        if !self.duplicate_scan {
            return Ok(page);
        }
        Ok(page
            .into_iter()
            .flat_map(|record| [record.clone(), record])
            .collect())
    }

    async fn read(&self, id: &RecordId) -> Result<KeyRecord, StoreError> {
        if let Some(delay) = self.slow_read_after_archive {
            if self.archived.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(delay).await;
            }
        }
        self.inner.read(id).await
    }

    async fn update(
        &self,
        id: &RecordId,
        expected_version: u64,
        new_record: KeyRecord,
    ) -> Result<(), StoreError> {
        let migrating = new_record.status == KeyStatus::Migrated;

        if migrating && self.conflict_on.as_ref() == Some(id) {
            let mut external = self.inner.read(id).await?;
            let current = external.version;
            external.version += 1;
            self.inner.update(id, current, external).await?;
        }

        self.inner.update(id, expected_version, new_record).await?;

        if migrating && self.panic_after_update_on.as_ref() == Some(id) {
            panic!("worker lost after storing {id}");
        }

        if migrating {
            let n = self.migration_writes.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((after, token)) = &self.cancel_after_update {
                if n == *after {
                    token.cancel();
                }
            }
        }
        Ok(())
    }

    async fn archive(&self, id: &RecordId, old_record: KeyRecord) -> Result<RecordId, StoreError> {
        let n = self.archive_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_archive_call == Some(n) {
            return Err(StoreError::Unavailable("archive volume offline".into()));
        }
        let archive_id = self.inner.archive(id, old_record).await?;

        let n = self.archived.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = &self.cancel_after_archive {
            if n == *after {
                token.cancel();
            }
        }
        Ok(archive_id)
    }

    async fn insert(&self, record: KeyRecord) -> Result<(), StoreError> {
        self.inner.insert(record).await
    }

    async fn archives_of(&self, id: &RecordId) -> Result<Vec<KeyRecord>, StoreError> {
        self.inner.archives_of(id).await
    }
}

/// Wraps a provider and records how legacy keys are decrypted.
pub struct TrackingProvider<P> {
    pub inner: P,
    delay: Duration,
    in_flight: Mutex<HashSet<Vec<u8>>>,
    decrypts: Mutex<HashMap<Vec<u8>, usize>>,
    overlaps: AtomicUsize,
}

impl<P> TrackingProvider<P> {
    pub fn new(inner: P, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            in_flight: Mutex::new(HashSet::new()),
            decrypts: Mutex::new(HashMap::new()),
            overlaps: AtomicUsize::new(0),
        }
    }

    /// Times two decrypts of the same ciphertext ran concurrently.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Number of decrypts per distinct ciphertext.
    pub fn decrypt_counts(&self) -> Vec<usize> {
        self.decrypts.lock().values().copied().collect()
    }
}

#[async_trait]
impl<P: CryptoProvider> CryptoProvider for TrackingProvider<P> {
    async fn decrypt(
        &self,
        spec: &AlgorithmSpec,
        ciphertext: &[u8],
    ) -> Result<SecretKeyMaterial, CryptoError> {
        *self.decrypts.lock().entry(ciphertext.to_vec()).or_insert(0) += 1;
        if !self.in_flight.lock().insert(ciphertext.to_vec()) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(self.delay).await;
        let result = self.inner.decrypt(spec, ciphertext).await;
        self.in_flight.lock().remove(ciphertext);
        result
    }

    async fn generate(&self, spec: &AlgorithmSpec) -> Result<KeyPair, CryptoError> {
        self.inner.generate(spec).await
    }

    async fn verify_compatibility(
        &self,
        old_public: &PublicKey,
        new_public: &PublicKey,
    ) -> Result<bool, CryptoError> {
        self.inner.verify_compatibility(old_public, new_public).await
    }

    async fn encrypt(
        &self,
        spec: &AlgorithmSpec,
        plaintext: &SecretKeyMaterial,
    ) -> Result<Vec<u8>, CryptoError> {
        self.inner.encrypt(spec, plaintext).await
    }
}

/// Accepts any target but rejects every completed inventory.
pub struct RejectingValidator;

impl ComplianceValidator for RejectingValidator {
    fn validate(&self, _: &AlgorithmSpec, _: &CompliancePolicy) -> Result<(), ComplianceError> {
        Ok(())
    }

    fn validate_inventory(
        &self,
        _: &AlgorithmSpec,
        policy: &CompliancePolicy,
        _: &InventoryStats,
    ) -> Result<(), ComplianceError> {
        Err(ComplianceError::PolicyViolation {
            policy: policy.name.clone(),
            reason: "forced failure".to_string(),
        })
    }
}
