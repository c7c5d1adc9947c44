// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! keymigrate: crash-safe migration of stored key inventories from legacy
//! algorithms to quantum-safe and hybrid ones.
//!
//! The crate re-keys every record in a [`KeyRecordStore`] from a source
//! algorithm to a target algorithm, keeps an archived copy of each old key,
//! gates the batch on a compliance policy, rolls the batch back when it
//! cannot be made compliant, and signs a proof of rotation for auditors.

pub mod algorithm;
pub mod audit;
pub mod compliance;
pub mod crypto;
pub mod migration;
pub mod store;

pub use algorithm::{AlgorithmFamily, AlgorithmSpec, AlgorithmType};
pub use audit::{AuditEvent, AuditLogger, AuditSeverity, MigrationOperation};
pub use compliance::{
    ComplianceError, CompliancePolicy, ComplianceValidator, InventoryStats, PolicyName,
    PolicyValidator,
};
pub use crypto::{
    AlgorithmBackend, CapabilityTable, CryptoError, CryptoProvider, HybridBackend, KeyPair,
    PublicKey, SecretKeyMaterial, SoftwareBackend,
};
pub use migration::{
    run_migration, CancellationToken, MigrationConfig, MigrationError, MigrationJob,
    MigrationOrchestrator, MigrationReport, MigrationRequest, MigrationStatus, PerKeyMigrator,
    ProofOfRotation, ProofSigner, RollbackStrategy,
};
pub use store::{
    KeyRecord, KeyRecordStore, KeyStatus, MemoryKeyStore, RecordId, RocksKeyStore, StoreError,
};
