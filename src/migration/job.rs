// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-run job state and counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::algorithm::AlgorithmSpec;
use crate::compliance::CompliancePolicy;
use crate::store::RecordId;

/// Which records a job is responsible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordScope {
    /// Every non-archived record on the source algorithm.
    SourceScan,
    /// Exactly these records, in this order.
    Records(Vec<RecordId>),
}

/// Counters for one run.
///
/// Only the orchestrator mutates these; workers report outcomes over a
/// channel.
#[derive(Debug, Default)]
pub struct JobCounters {
    total: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    cancelled: AtomicU64,
    security_checks: AtomicU64,
    rolled_back: AtomicU64,
}

impl JobCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dispatched(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.security_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_rolled_back(&self, n: u64) {
        self.rolled_back.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            security_checks: self.security_checks.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one point in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Records dispatched to a migrator.
    pub total: u64,
    /// Records re-keyed under the target spec.
    pub processed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub cancelled: u64,
    pub security_checks: u64,
    /// Records restored to their pre-migration snapshot.
    pub rolled_back: u64,
}

/// A single migration run.
#[derive(Debug)]
pub struct MigrationJob {
    pub job_id: String,
    pub source_spec: AlgorithmSpec,
    pub target_spec: AlgorithmSpec,
    pub policy: CompliancePolicy,
    pub scope: RecordScope,
    pub started_at: SystemTime,
    pub counters: JobCounters,
}

impl MigrationJob {
    /// Creates a job that scans every record on `source_spec`'s algorithm.
    pub fn new(
        source_spec: AlgorithmSpec,
        target_spec: AlgorithmSpec,
        policy: CompliancePolicy,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            source_spec,
            target_spec,
            policy,
            scope: RecordScope::SourceScan,
            started_at: SystemTime::now(),
            counters: JobCounters::new(),
        }
    }

    /// Restricts the job to the given records.
    pub fn with_records(mut self, ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.scope = RecordScope::Records(ids.into_iter().collect());
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }
}
