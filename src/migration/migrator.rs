// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-record migration state machine.
//!
//! ```text
//! Active -> Decrypting -> Generating -> Verifying -> Storing -> Archiving -> Migrated
//!   |           |             |            |           |           |
//!   +-----------+-------------+------------+-----------+-----------+--> Failed
//! ```
//!
//! A record already on the target spec is `Skipped` without a version bump.
//! Cancellation is observed before each step. A record that stored its new
//! key but was cancelled before archiving is handed back with a rollback
//! entry so the orchestrator can restore it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, instrument, warn};

use crate::algorithm::AlgorithmSpec;
use crate::audit::{AuditEvent, AuditLogger, MigrationOperation};
use crate::crypto::{check_public_key, CryptoError, CryptoProvider, KeyPair, PublicKey};
use crate::store::{now_millis, KeyRecord, KeyRecordStore, KeyStatus, RecordId, StoreError};

use super::cancel::RunSignal;
use super::config::MigrationConfig;
use super::error::MigrationError;
use super::rollback::{RollbackEntry, RollbackPlan, RollbackStrategy};

/// States a record passes through during migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationStep {
    Active,
    Decrypting,
    Generating,
    Verifying,
    Storing,
    Archiving,
    Migrated,
    Failed,
    Skipped,
}

impl MigrationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStep::Active => "active",
            MigrationStep::Decrypting => "decrypting",
            MigrationStep::Generating => "generating",
            MigrationStep::Verifying => "verifying",
            MigrationStep::Storing => "storing",
            MigrationStep::Archiving => "archiving",
            MigrationStep::Migrated => "migrated",
            MigrationStep::Failed => "failed",
            MigrationStep::Skipped => "skipped",
        }
    }

    /// The record status this step corresponds to.
    ///
    /// The store only ever holds `Active`, `Migrated` and `Archived` rows;
    /// `Migrating` and `Failed` describe records in reports and logs.
    pub fn key_status(&self) -> KeyStatus {
        match self {
            MigrationStep::Active | MigrationStep::Skipped => KeyStatus::Active,
            MigrationStep::Decrypting
            | MigrationStep::Generating
            | MigrationStep::Verifying
            | MigrationStep::Storing
            | MigrationStep::Archiving => KeyStatus::Migrating,
            MigrationStep::Migrated => KeyStatus::Migrated,
            MigrationStep::Failed => KeyStatus::Failed,
        }
    }

    /// Returns true for states a record cannot leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationStep::Migrated | MigrationStep::Failed | MigrationStep::Skipped
        )
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of migrating one record.
#[derive(Debug)]
pub enum RecordOutcome {
    /// New key stored and old key archived.
    Migrated {
        entry: RollbackEntry,
        archive_id: RecordId,
    },
    /// Already on the target spec.
    Skipped { id: RecordId },
    Failed {
        id: RecordId,
        step: MigrationStep,
        error: MigrationError,
    },
    /// Stopped before `step`. `partial` is set when the new key was already
    /// stored and must be reverted.
    Cancelled {
        id: RecordId,
        step: MigrationStep,
        partial: Option<RollbackEntry>,
    },
}

impl RecordOutcome {
    pub fn record_id(&self) -> &RecordId {
        match self {
            RecordOutcome::Migrated { entry, .. } => &entry.record_id,
            RecordOutcome::Skipped { id }
            | RecordOutcome::Failed { id, .. }
            | RecordOutcome::Cancelled { id, .. } => id,
        }
    }

    /// The state the record ended in.
    pub fn final_step(&self) -> MigrationStep {
        match self {
            RecordOutcome::Migrated { .. } => MigrationStep::Migrated,
            RecordOutcome::Skipped { .. } => MigrationStep::Skipped,
            RecordOutcome::Failed { .. } | RecordOutcome::Cancelled { .. } => {
                MigrationStep::Failed
            }
        }
    }
}

enum Interrupted {
    Failed {
        step: MigrationStep,
        error: MigrationError,
    },
    Cancelled {
        step: MigrationStep,
        partial: Option<RollbackEntry>,
    },
}

fn failed(step: MigrationStep, error: MigrationError) -> Interrupted {
    Interrupted::Failed { step, error }
}

/// Drives one record from `Active` to a terminal state.
pub struct PerKeyMigrator<S, P> {
    store: Arc<S>,
    provider: Arc<P>,
    audit: Arc<AuditLogger>,
    rollback: RollbackStrategy<S>,
    config: MigrationConfig,
    target: AlgorithmSpec,
    job_id: String,
}

impl<S, P> PerKeyMigrator<S, P>
where
    S: KeyRecordStore,
    P: CryptoProvider,
{
    pub fn new(
        store: Arc<S>,
        provider: Arc<P>,
        audit: Arc<AuditLogger>,
        config: MigrationConfig,
        target: AlgorithmSpec,
        job_id: impl Into<String>,
    ) -> Self {
        let job_id = job_id.into();
        let rollback = RollbackStrategy::new(
            store.clone(),
            audit.clone(),
            config.step_timeout,
            job_id.clone(),
        );
        Self {
            store,
            provider,
            audit,
            rollback,
            config,
            target,
            job_id,
        }
    }

    pub fn target(&self) -> &AlgorithmSpec {
        &self.target
    }

    /// Migrates `record` to the target spec.
    ///
    /// `record` is the view read by the scan; its version is the one the
    /// store write expects.
    #[instrument(skip_all, fields(job_id = %self.job_id, record_id = %record.id))]
    pub async fn migrate(&self, record: KeyRecord, signal: &RunSignal) -> RecordOutcome {
        let id = record.id.clone();

        if record.is_on(&self.target) {
            debug!("Record already on target spec");
            self.audit.log(
                AuditEvent::new(MigrationOperation::RecordSkipped, id.as_str())
                    .with_job(&self.job_id),
            );
            return RecordOutcome::Skipped { id };
        }

        match self.run_steps(record, signal).await {
            Ok((entry, archive_id)) => {
                self.audit.log(
                    AuditEvent::new(MigrationOperation::SecurityCheck, id.as_str())
                        .with_job(&self.job_id)
                        .with_details(format!(
                            "{} -> {}",
                            entry.snapshot.algorithm_spec, self.target
                        )),
                );
                self.audit.log(
                    AuditEvent::new(MigrationOperation::RecordMigrated, id.as_str())
                        .with_job(&self.job_id)
                        .with_details(format!("v{}", entry.post_migration_version)),
                );
                RecordOutcome::Migrated { entry, archive_id }
            }
            Err(Interrupted::Failed { step, error }) => {
                warn!(%step, %error, "Record migration failed");
                self.audit.log(
                    AuditEvent::new(MigrationOperation::RecordFailed, id.as_str())
                        .with_job(&self.job_id)
                        .with_details(step.as_str())
                        .with_error(error.to_string()),
                );
                RecordOutcome::Failed { id, step, error }
            }
            Err(Interrupted::Cancelled { step, partial }) => {
                debug!(
                    %step,
                    status = step.key_status().as_str(),
                    partial = partial.is_some(),
                    "Record migration cancelled"
                );
                RecordOutcome::Cancelled { id, step, partial }
            }
        }
    }

    async fn run_steps(
        &self,
        snapshot: KeyRecord,
        signal: &RunSignal,
    ) -> Result<(RollbackEntry, RecordId), Interrupted> {
        if snapshot.is_archived() {
            return Err(failed(
                MigrationStep::Active,
                MigrationError::Ineligible("archived snapshot".to_string()),
            ));
        }

        // Decrypting
        checkpoint(signal, MigrationStep::Decrypting)?;
        let legacy = self
            .bounded(
                MigrationStep::Decrypting,
                self.provider
                    .decrypt(&snapshot.algorithm_spec, &snapshot.encrypted_private_key),
            )
            .await?
            .map_err(|e| failed(MigrationStep::Decrypting, MigrationError::LegacyDecryption(e)))?;

        // Generating
        checkpoint(signal, MigrationStep::Generating)?;
        let pair = self.generate_with_retry(signal).await?;

        // Verifying
        checkpoint(signal, MigrationStep::Verifying)?;
        self.verify(&snapshot, &pair).await?;
        drop(legacy);

        // Storing
        checkpoint(signal, MigrationStep::Storing)?;
        let sealed = self
            .bounded(
                MigrationStep::Storing,
                self.provider.encrypt(&self.target, &pair.private),
            )
            .await?
            .map_err(|e| failed(MigrationStep::Storing, MigrationError::Sealing(e)))?;

        let new_version = snapshot.version + 1;
        let migrated = KeyRecord {
            id: snapshot.id.clone(),
            public_key: pair.public.bytes.clone(),
            encrypted_private_key: sealed,
            algorithm_spec: self.target.clone(),
            version: new_version,
            status: KeyStatus::Migrated,
            created_at: now_millis(),
            archived_from: None,
        };

        self.bounded(
            MigrationStep::Storing,
            self.store.update(&snapshot.id, snapshot.version, migrated),
        )
        .await?
        .map_err(|e| match e {
            StoreError::VersionConflict { .. } => failed(
                MigrationStep::Storing,
                MigrationError::ConcurrentModification(snapshot.id.clone()),
            ),
            other => failed(MigrationStep::Storing, MigrationError::Store(other)),
        })?;

        let entry = RollbackEntry {
            record_id: snapshot.id.clone(),
            snapshot,
            post_migration_version: new_version,
        };

        // Archiving
        if signal.should_stop() {
            return Err(Interrupted::Cancelled {
                step: MigrationStep::Archiving,
                partial: Some(entry),
            });
        }
        let archived = tokio::time::timeout(
            self.config.step_timeout,
            self.store.archive(&entry.record_id, entry.snapshot.clone()),
        )
        .await;

        match archived {
            Ok(Ok(archive_id)) => {
                self.audit.log(
                    AuditEvent::new(MigrationOperation::RecordArchived, entry.record_id.as_str())
                        .with_job(&self.job_id)
                        .with_details(format!("archive {archive_id}")),
                );
                Ok((entry, archive_id))
            }
            Ok(Err(err)) => Err(self.undo_store(entry, MigrationError::Archival(err)).await),
            Err(_) => Err(self
                .undo_store(
                    entry,
                    MigrationError::Archival(StoreError::Timeout("archive")),
                )
                .await),
        }
    }

    async fn generate_with_retry(&self, signal: &RunSignal) -> Result<KeyPair, Interrupted> {
        let attempts = self.config.generation_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match tokio::time::timeout(
                self.config.step_timeout,
                self.provider.generate(&self.target),
            )
            .await
            {
                Ok(Ok(pair)) => return Ok(pair),
                Ok(Err(err)) => err,
                Err(_) => CryptoError::KeyGeneration("generation timed out".to_string()),
            };

            if !err.is_transient() || attempt >= attempts {
                return Err(failed(
                    MigrationStep::Generating,
                    MigrationError::KeyGeneration {
                        attempts: attempt,
                        source: err,
                    },
                ));
            }

            let backoff = self.config.backoff_for(attempt);
            warn!(attempt, ?backoff, error = %err, "Key generation failed, retrying");
            tokio::time::sleep(backoff).await;
            checkpoint(signal, MigrationStep::Generating)?;
        }
    }

    async fn verify(&self, snapshot: &KeyRecord, pair: &KeyPair) -> Result<(), Interrupted> {
        let incompatible =
            |reason: String| failed(MigrationStep::Verifying, MigrationError::Compatibility(reason));

        if pair.public.algorithm != self.target.algorithm_type {
            return Err(incompatible(format!(
                "provider returned a {} key for a {} target",
                pair.public.algorithm, self.target.algorithm_type
            )));
        }
        check_public_key(&pair.public).map_err(|e| incompatible(e.to_string()))?;

        let old_public = PublicKey::new(
            snapshot.algorithm_spec.algorithm_type,
            snapshot.public_key.clone(),
        );
        let compatible = self
            .bounded(
                MigrationStep::Verifying,
                self.provider.verify_compatibility(&old_public, &pair.public),
            )
            .await?
            .map_err(|e| incompatible(e.to_string()))?;

        if !compatible {
            return Err(incompatible(
                "cross-compatibility check rejected the new key".to_string(),
            ));
        }
        Ok(())
    }

    /// Reverts this record's store write after archival failed.
    async fn undo_store(&self, entry: RollbackEntry, cause: MigrationError) -> Interrupted {
        error!(error = %cause, "Archival failed, reverting stored key");
        match self.rollback.revert(&RollbackPlan::from(vec![entry])).await {
            Ok(_) => failed(MigrationStep::Archiving, cause),
            Err(rollback) => failed(
                MigrationStep::Archiving,
                MigrationError::RevertFailed(rollback),
            ),
        }
    }

    async fn bounded<T>(
        &self,
        step: MigrationStep,
        fut: impl Future<Output = T>,
    ) -> Result<T, Interrupted> {
        tokio::time::timeout(self.config.step_timeout, fut)
            .await
            .map_err(|_| failed(step, MigrationError::Timeout { step }))
    }
}

fn checkpoint(signal: &RunSignal, step: MigrationStep) -> Result<(), Interrupted> {
    if signal.should_stop() {
        Err(Interrupted::Cancelled {
            step,
            partial: None,
        })
    } else {
        Ok(())
    }
}
