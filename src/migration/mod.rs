// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Batch key migration.
//!
//! A migration job moves every in-scope key record from a source algorithm
//! to a target algorithm. Each record is driven through its own state
//! machine by a [`PerKeyMigrator`]; the [`MigrationOrchestrator`] bounds
//! concurrency, collects outcomes, and decides the batch result.
//!
//! ```text
//!                 +---------------------+
//!   MigrationJob  | MigrationOrchestrator|--- pre-flight ComplianceValidator
//!   ------------> |  scan / dispatch     |
//!                 +----------+----------+
//!                            | Semaphore (concurrency_limit)
//!             +--------------+--------------+
//!             v              v              v
//!      PerKeyMigrator  PerKeyMigrator  PerKeyMigrator
//!             |  CryptoProvider + KeyRecordStore
//!             +------> mpsc outcomes ------>+
//!                                           v
//!                    post-migration compliance, RollbackStrategy,
//!                    signed ProofOfRotation
//! ```
//!
//! # Guarantees
//!
//! - A record's version increases by exactly one per successful migration.
//! - Every migrated record has an archived copy of its previous key.
//! - No id is dispatched twice in one run.
//! - A batch that fails compliance, or hits a fatal error, is rolled back.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keymigrate::algorithm::AlgorithmSpec;
//! use keymigrate::compliance::CompliancePolicy;
//! use keymigrate::crypto::{CapabilityTable, SoftwareBackend};
//! use keymigrate::migration::{run_migration, CancellationToken, MigrationRequest, ProofSigner};
//! use keymigrate::store::MemoryKeyStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryKeyStore::new());
//! let provider = Arc::new(CapabilityTable::software(SoftwareBackend::generate()?));
//! let request = MigrationRequest::new(
//!     AlgorithmSpec::rsa2048(),
//!     AlgorithmSpec::hybrid_kyber768(),
//!     CompliancePolicy::nist_sp800_208(),
//! );
//!
//! let report = run_migration(store, provider, ProofSigner::generate()?, request, CancellationToken::new()).await?;
//! println!("{}: {} migrated", report.status, report.counts.processed);
//! # Ok(())
//! # }
//! ```

mod cancel;
mod config;
mod error;
mod job;
mod migrator;
mod orchestrator;
mod proof;
mod rollback;

pub use cancel::{CancellationToken, RunSignal, StopReason};
pub use config::{ConfigError, MigrationConfig};
pub use error::{ErrorClass, MigrationError, ProofError};
pub use job::{JobCounters, MetricsSnapshot, MigrationJob, RecordScope};
pub use migrator::{MigrationStep, PerKeyMigrator, RecordOutcome};
pub use orchestrator::{
    run_migration, MigrationOrchestrator, MigrationReport, MigrationRequest, MigrationStatus,
    RecordFailure,
};
pub use proof::{ProofClaims, ProofOfRotation, ProofSigner};
pub use rollback::{RollbackEntry, RollbackError, RollbackPlan, RollbackStrategy, RollbackSummary};
