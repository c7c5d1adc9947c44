// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Reverting migrated records to their pre-migration snapshots.
//!
//! Each entry is restored with an optimistic `update` that expects the
//! post-migration version. A record someone else touched after migration
//! is reported, never overwritten.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::audit::{AuditEvent, AuditLogger, MigrationOperation};
use crate::store::{KeyRecord, KeyRecordStore, RecordId};

/// One record to restore.
#[derive(Debug, Clone)]
pub struct RollbackEntry {
    pub record_id: RecordId,
    /// The record as read before migration.
    pub snapshot: KeyRecord,
    /// Version written by the migration.
    pub post_migration_version: u64,
}

/// Records that can be reverted, built up as a batch migrates.
#[derive(Debug, Clone, Default)]
pub struct RollbackPlan {
    entries: Vec<RollbackEntry>,
}

impl RollbackPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RollbackEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, other: RollbackPlan) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RollbackEntry] {
        &self.entries
    }

    /// Ids of the records in the plan.
    pub fn record_ids(&self) -> impl Iterator<Item = &RecordId> {
        self.entries.iter().map(|e| &e.record_id)
    }
}

impl From<Vec<RollbackEntry>> for RollbackPlan {
    fn from(entries: Vec<RollbackEntry>) -> Self {
        Self { entries }
    }
}

/// Outcome of a fully applied plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    pub reverted: usize,
}

/// Errors raised when a plan cannot be fully applied.
#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("rollback failed for {} record(s) ({reverted} reverted): {}", .failed.len(), describe(.failed))]
    RollbackFailure {
        /// Records left in their post-migration state, with the reason.
        failed: Vec<(RecordId, String)>,
        reverted: usize,
    },
}

impl RollbackError {
    /// Ids that need manual recovery.
    pub fn failed_ids(&self) -> Vec<RecordId> {
        match self {
            RollbackError::RollbackFailure { failed, .. } => {
                failed.iter().map(|(id, _)| id.clone()).collect()
            }
        }
    }

    /// Records that were restored before the failure was reported.
    pub fn reverted(&self) -> usize {
        match self {
            RollbackError::RollbackFailure { reverted, .. } => *reverted,
        }
    }
}

fn describe(failed: &[(RecordId, String)]) -> String {
    failed
        .iter()
        .map(|(id, reason)| format!("{id}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Applies rollback plans against a store.
pub struct RollbackStrategy<S> {
    store: Arc<S>,
    audit: Arc<AuditLogger>,
    step_timeout: Duration,
    job_id: String,
}

impl<S: KeyRecordStore> RollbackStrategy<S> {
    pub fn new(
        store: Arc<S>,
        audit: Arc<AuditLogger>,
        step_timeout: Duration,
        job_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            audit,
            step_timeout,
            job_id: job_id.into(),
        }
    }

    /// Restores every entry in `plan`.
    ///
    /// All entries are attempted even after a failure.
    #[instrument(skip_all, fields(job_id = %self.job_id, entries = plan.len()))]
    pub async fn revert(&self, plan: &RollbackPlan) -> Result<RollbackSummary, RollbackError> {
        let mut reverted = 0usize;
        let mut failed = Vec::new();

        for entry in plan.entries() {
            match self.revert_one(entry).await {
                Ok(()) => {
                    reverted += 1;
                    self.audit.log(
                        AuditEvent::new(MigrationOperation::RecordReverted, entry.record_id.as_str())
                            .with_job(&self.job_id)
                            .with_details(format!(
                                "restored {} v{}",
                                entry.snapshot.algorithm_spec, entry.snapshot.version
                            )),
                    );
                }
                Err(reason) => {
                    error!(record_id = %entry.record_id, %reason, "Rollback of record failed");
                    self.audit.log(
                        AuditEvent::new(MigrationOperation::RollbackFailed, entry.record_id.as_str())
                            .with_job(&self.job_id)
                            .with_error(reason.clone()),
                    );
                    failed.push((entry.record_id.clone(), reason));
                }
            }
        }

        if failed.is_empty() {
            info!(reverted, "Rollback complete");
            Ok(RollbackSummary { reverted })
        } else {
            warn!(reverted, failed = failed.len(), "Rollback incomplete");
            Err(RollbackError::RollbackFailure { failed, reverted })
        }
    }

    async fn revert_one(&self, entry: &RollbackEntry) -> Result<(), String> {
        let restored = entry.snapshot.clone();
        let write = self
            .store
            .update(&entry.record_id, entry.post_migration_version, restored);

        match tokio::time::timeout(self.step_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err("store update timed out".to_string()),
        }
    }
}
