// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Batch orchestration.
//!
//! The orchestrator pages through the in-scope records, dispatches one
//! [`PerKeyMigrator`] task per record under a semaphore, and folds the
//! outcomes its workers send back over a channel into the job counters.
//! Once every dispatched record is terminal it reverts anything cancelled
//! half-way, runs post-migration compliance, rolls back the whole batch if
//! that fails (or if a fatal error occurred), and signs a proof of rotation.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::algorithm::{AlgorithmSpec, AlgorithmType};
use crate::audit::{AuditEvent, AuditLogger, MigrationOperation};
use crate::compliance::{
    CompliancePolicy, ComplianceValidator, InventoryStats, PolicyValidator,
};
use crate::crypto::CryptoProvider;
use crate::store::{now_millis, KeyRecord, KeyRecordStore, KeyStatus, RecordId, StoreError};

use super::cancel::{CancellationToken, RunSignal, StopReason};
use super::config::{ConfigError, MigrationConfig};
use super::error::MigrationError;
use super::job::{MetricsSnapshot, MigrationJob, RecordScope};
use super::migrator::{MigrationStep, PerKeyMigrator, RecordOutcome};
use super::proof::{ProofClaims, ProofOfRotation, ProofSigner};
use super::rollback::{RollbackEntry, RollbackError, RollbackPlan, RollbackStrategy};

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Every in-scope record that could be migrated was, and compliance passed.
    Success,
    /// The target or the resulting inventory failed the policy; the batch was
    /// rolled back.
    ComplianceFailure,
    /// The run was cancelled; partially migrated records were reverted.
    RolledBack,
    /// A batch-level error halted the run.
    Fatal,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Success => "success",
            MigrationStatus::ComplianceFailure => "compliance_failure",
            MigrationStatus::RolledBack => "rolled_back",
            MigrationStatus::Fatal => "fatal",
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why one record did not migrate.
#[derive(Debug)]
pub struct RecordFailure {
    pub id: RecordId,
    /// The step that was running when the record failed.
    pub step: MigrationStep,
    pub error: MigrationError,
}

/// Result of a run.
#[derive(Debug)]
pub struct MigrationReport {
    pub job_id: String,
    pub status: MigrationStatus,
    pub counts: MetricsSnapshot,
    /// Machine-readable explanation for any non-success status.
    pub reason: Option<String>,
    pub failures: Vec<RecordFailure>,
    /// Records that could not be reverted and need manual recovery.
    pub unrecovered: Vec<RecordId>,
    pub proof: Option<ProofOfRotation>,
    pub elapsed: Duration,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.status == MigrationStatus::Success
    }

    /// Records migrated per second of wall-clock time.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.counts.processed as f64 / secs
        } else {
            0.0
        }
    }

    /// Summary suitable for machine consumption.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "job_id": self.job_id,
            "status": self.status,
            "counts": self.counts,
            "reason": self.reason,
            "failures": self
                .failures
                .iter()
                .map(|f| serde_json::json!({
                    "id": f.id,
                    "status": KeyStatus::Failed,
                    "step": f.step.as_str(),
                    "error": f.error.to_string(),
                }))
                .collect::<Vec<_>>(),
            "unrecovered": self.unrecovered,
            "elapsed_ms": self.elapsed.as_millis() as u64,
            "throughput": self.throughput(),
            "proof": self.proof,
        })
    }
}

type ScanItem = Result<KeyRecord, (RecordId, StoreError)>;

/// Pages through the records a job is responsible for.
struct RecordScan<S> {
    store: Arc<S>,
    source: ScanSource,
    page_size: usize,
    timeout: Duration,
}

enum ScanSource {
    Algorithm {
        algorithm: AlgorithmType,
        after: Option<RecordId>,
        exhausted: bool,
    },
    Ids(std::vec::IntoIter<RecordId>),
}

impl<S: KeyRecordStore> RecordScan<S> {
    fn new(store: Arc<S>, job: &MigrationJob, config: &MigrationConfig) -> Self {
        let source = match &job.scope {
            RecordScope::SourceScan => ScanSource::Algorithm {
                algorithm: job.source_spec.algorithm_type,
                after: None,
                exhausted: false,
            },
            RecordScope::Records(ids) => ScanSource::Ids(ids.clone().into_iter()),
        };
        Self {
            store,
            source,
            page_size: config.scan_page_size,
            timeout: config.step_timeout,
        }
    }

    /// Returns the next page; empty once the scope is exhausted.
    async fn next_page(&mut self) -> Result<Vec<ScanItem>, StoreError> {
        match &mut self.source {
            ScanSource::Algorithm {
                algorithm,
                after,
                exhausted,
            } => {
                if *exhausted {
                    return Ok(Vec::new());
                }
                let page = tokio::time::timeout(
                    self.timeout,
                    self.store.scan(*algorithm, after.as_ref(), self.page_size),
                )
                .await
                .map_err(|_| StoreError::Timeout("scan"))??;

                if page.len() < self.page_size {
                    *exhausted = true;
                }
                if let Some(last) = page.last() {
                    *after = Some(last.id.clone());
                }
                Ok(page.into_iter().map(Ok).collect())
            }
            ScanSource::Ids(ids) => {
                let mut page = Vec::new();
                for id in ids.by_ref().take(self.page_size) {
                    let read = tokio::time::timeout(self.timeout, self.store.read(&id))
                        .await
                        .unwrap_or(Err(StoreError::Timeout("read")));
                    page.push(read.map_err(|e| (id, e)));
                }
                Ok(page)
            }
        }
    }

    /// Adds every id left in the scope to `unvisited`, without dispatching.
    async fn collect_remaining(
        &mut self,
        unvisited: &mut HashSet<RecordId>,
    ) -> Result<(), StoreError> {
        if let ScanSource::Ids(ids) = &mut self.source {
            unvisited.extend(ids.by_ref());
            return Ok(());
        }
        loop {
            let page = self.next_page().await?;
            if page.is_empty() {
                return Ok(());
            }
            unvisited.extend(page.iter().map(|item| scan_item_id(item).clone()));
        }
    }
}

fn scan_item_id(item: &ScanItem) -> &RecordId {
    match item {
        Ok(record) => &record.id,
        Err((id, _)) => id,
    }
}

/// Accumulates worker outcomes for one run.
#[derive(Default)]
struct BatchState {
    plan: RollbackPlan,
    partial: RollbackPlan,
    failures: Vec<RecordFailure>,
    fatal: Option<String>,
    /// In-scope records a stopped run never dispatched.
    undispatched: u64,
    /// Records left in an unknown state that need manual recovery.
    unrecovered: Vec<RecordId>,
}

impl BatchState {
    fn absorb(&mut self, outcome: RecordOutcome, job: &MigrationJob, signal: &RunSignal) {
        match outcome {
            RecordOutcome::Migrated { entry, .. } => {
                job.counters.record_processed();
                self.plan.push(entry);
            }
            RecordOutcome::Skipped { .. } => job.counters.record_skipped(),
            RecordOutcome::Failed { id, step, error } => {
                job.counters.record_failed();
                if error.is_fatal() {
                    self.halt(format!("{id}: {error}"), signal);
                }
                self.failures.push(RecordFailure { id, step, error });
            }
            RecordOutcome::Cancelled { partial, .. } => {
                job.counters.record_cancelled();
                if let Some(entry) = partial {
                    self.partial.push(entry);
                }
            }
        }
    }

    fn halt(&mut self, reason: String, signal: &RunSignal) {
        if self.fatal.is_none() {
            error!(%reason, "Fatal error, halting batch");
            self.fatal = Some(reason);
        }
        signal.halt();
    }
}

/// Runs migration jobs against a store and crypto provider.
pub struct MigrationOrchestrator<S, P, V = PolicyValidator> {
    store: Arc<S>,
    provider: Arc<P>,
    validator: Arc<V>,
    signer: Arc<ProofSigner>,
    audit: Arc<AuditLogger>,
    config: MigrationConfig,
}

impl<S, P> MigrationOrchestrator<S, P, PolicyValidator>
where
    S: KeyRecordStore + 'static,
    P: CryptoProvider + 'static,
{
    /// Creates an orchestrator using the standard policy validator.
    pub fn new(
        store: Arc<S>,
        provider: Arc<P>,
        signer: ProofSigner,
        config: MigrationConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let audit = Arc::new(AuditLogger::new(config.service_name.clone()));
        Ok(Self {
            store,
            provider,
            validator: Arc::new(PolicyValidator),
            signer: Arc::new(signer),
            audit,
            config,
        })
    }
}

impl<S, P, V> MigrationOrchestrator<S, P, V>
where
    S: KeyRecordStore + 'static,
    P: CryptoProvider + 'static,
    V: ComplianceValidator,
{
    /// Replaces the compliance validator.
    pub fn with_validator<W: ComplianceValidator>(self, validator: W) -> MigrationOrchestrator<S, P, W> {
        MigrationOrchestrator {
            store: self.store,
            provider: self.provider,
            validator: Arc::new(validator),
            signer: self.signer,
            audit: self.audit,
            config: self.config,
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub fn signer(&self) -> &ProofSigner {
        &self.signer
    }

    /// Runs `job` to completion.
    ///
    /// Never returns early with an error: every outcome, including fatal
    /// ones, is described by the report.
    #[instrument(
        skip_all,
        fields(job_id = %job.job_id, source = %job.source_spec, target = %job.target_spec)
    )]
    pub async fn run(&self, job: &MigrationJob, cancel: CancellationToken) -> MigrationReport {
        let started = Instant::now();
        let signal = RunSignal::new(cancel, self.config.run_timeout.map(|t| started + t));

        info!(
            policy = %job.policy.name,
            concurrency = self.config.concurrency_limit,
            "Migration run started"
        );
        self.audit.log(
            AuditEvent::new(MigrationOperation::BatchStart, job.job_id.as_str())
                .with_job(&job.job_id)
                .with_details(format!(
                    "{} -> {} under {}",
                    job.source_spec, job.target_spec, job.policy.name
                )),
        );

        if let Err(err) = self.validator.validate(&job.target_spec, &job.policy) {
            warn!(error = %err, "Target rejected by compliance policy");
            self.audit.log(
                AuditEvent::new(MigrationOperation::ComplianceFailed, job.job_id.as_str())
                    .with_job(&job.job_id)
                    .with_details("pre-flight")
                    .with_error(err.to_string()),
            );
            return self.finish(
                job,
                started,
                MigrationStatus::ComplianceFailure,
                Some(err.to_string()),
                BatchState::default(),
                Vec::new(),
                false,
            );
        }

        let mut batch = BatchState::default();
        self.dispatch(job, &signal, &mut batch).await;
        // The deadline only governs dispatch; post-migration checks always run.
        let stopped = signal.stop_reason();

        let rollback = RollbackStrategy::new(
            self.store.clone(),
            self.audit.clone(),
            self.config.step_timeout,
            job.job_id.clone(),
        );
        let mut unrecovered = std::mem::take(&mut batch.unrecovered);

        // Records that stored a new key but were stopped before archiving.
        let partial = std::mem::take(&mut batch.partial);
        if !partial.is_empty() {
            info!(records = partial.len(), "Reverting partially migrated records");
            if let Err(err) = self.revert(&rollback, &partial, job).await {
                unrecovered.extend(err.failed_ids());
                let reason = err.to_string();
                batch.halt(reason, &signal);
            }
        }

        if let Some(reason) = batch.fatal.take() {
            let plan = std::mem::take(&mut batch.plan);
            let reason = match self.revert(&rollback, &plan, job).await {
                Ok(()) => reason,
                Err(err) => {
                    unrecovered.extend(err.failed_ids());
                    format!("{reason}; {err}")
                }
            };
            return self.finish(
                job,
                started,
                MigrationStatus::Fatal,
                Some(reason),
                batch,
                unrecovered,
                false,
            );
        }

        let stats = self.inventory(job, &batch).await;
        debug!(?stats, "Post-migration inventory");

        if let Err(err) = self
            .validator
            .validate_inventory(&job.target_spec, &job.policy, &stats)
        {
            warn!(error = %err, "Post-migration compliance failed, rolling back batch");
            self.audit.log(
                AuditEvent::new(MigrationOperation::ComplianceFailed, job.job_id.as_str())
                    .with_job(&job.job_id)
                    .with_details("post-migration")
                    .with_error(err.to_string()),
            );
            let plan = std::mem::take(&mut batch.plan);
            let (status, reason) = match self.revert(&rollback, &plan, job).await {
                Ok(()) => (MigrationStatus::ComplianceFailure, err.to_string()),
                Err(rollback_err) => {
                    unrecovered.extend(rollback_err.failed_ids());
                    (MigrationStatus::Fatal, format!("{err}; {rollback_err}"))
                }
            };
            return self.finish(job, started, status, Some(reason), batch, unrecovered, false);
        }

        let (status, reason) = match stopped {
            Some(StopReason::Cancelled) => (
                MigrationStatus::RolledBack,
                Some(format!("cancelled; {} partially migrated record(s) reverted", partial.len())),
            ),
            Some(StopReason::TimedOut) => (
                MigrationStatus::RolledBack,
                Some(format!(
                    "run timeout exceeded; {} partially migrated record(s) reverted",
                    partial.len()
                )),
            ),
            _ => (MigrationStatus::Success, None),
        };
        self.finish(job, started, status, reason, batch, unrecovered, true)
    }

    async fn dispatch(&self, job: &MigrationJob, signal: &RunSignal, batch: &mut BatchState) {
        let migrator = Arc::new(PerKeyMigrator::new(
            self.store.clone(),
            self.provider.clone(),
            self.audit.clone(),
            self.config.clone(),
            job.target_spec.clone(),
            job.job_id.clone(),
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit));
        let (tx, mut rx) = mpsc::unbounded_channel::<RecordOutcome>();
        let mut workers: Vec<(KeyRecord, JoinHandle<()>)> = Vec::new();
        let mut seen: HashSet<RecordId> = HashSet::new();
        let mut unvisited: HashSet<RecordId> = HashSet::new();
        let mut scan = RecordScan::new(self.store.clone(), job, &self.config);

        'pages: while !signal.should_stop() {
            let page = match scan.next_page().await {
                Ok(page) => page,
                Err(err) => {
                    batch.halt(format!("record scan failed: {err}"), signal);
                    break;
                }
            };
            if page.is_empty() {
                break;
            }

            let mut items = page.into_iter();
            while let Some(item) = items.next() {
                while let Ok(outcome) = rx.try_recv() {
                    batch.absorb(outcome, job, signal);
                }
                if signal.should_stop() {
                    unvisited.insert(scan_item_id(&item).clone());
                    unvisited.extend(items.by_ref().map(|i| scan_item_id(&i).clone()));
                    break 'pages;
                }

                let record = match item {
                    Ok(record) => record,
                    Err((id, err)) => {
                        if seen.insert(id.clone()) {
                            job.counters.record_dispatched();
                            let outcome = RecordOutcome::Failed {
                                id,
                                step: MigrationStep::Active,
                                error: MigrationError::Store(err),
                            };
                            batch.absorb(outcome, job, signal);
                        }
                        continue;
                    }
                };

                if !seen.insert(record.id.clone()) {
                    debug!(record_id = %record.id, "Record already dispatched in this run");
                    continue;
                }

                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        seen.remove(&record.id);
                        unvisited.insert(record.id);
                        unvisited.extend(items.by_ref().map(|i| scan_item_id(&i).clone()));
                        break 'pages;
                    }
                };
                // Outcomes are sent before permits are released.
                while let Ok(outcome) = rx.try_recv() {
                    batch.absorb(outcome, job, signal);
                }
                if signal.should_stop() {
                    seen.remove(&record.id);
                    unvisited.insert(record.id);
                    unvisited.extend(items.by_ref().map(|i| scan_item_id(&i).clone()));
                    break 'pages;
                }

                job.counters.record_dispatched();
                let dispatched = record.clone();
                let migrator = migrator.clone();
                let signal = signal.clone();
                let tx = tx.clone();
                let handle = tokio::spawn(async move {
                    let outcome = migrator.migrate(record, &signal).await;
                    let _ = tx.send(outcome);
                    drop(permit);
                });
                workers.push((dispatched, handle));
            }
        }

        drop(tx);
        while let Some(outcome) = rx.recv().await {
            batch.absorb(outcome, job, signal);
        }

        for (dispatched, handle) in workers {
            if let Err(err) = handle.await {
                let id = dispatched.id.clone();
                error!(record_id = %id, error = %err, "Migration worker died");
                job.counters.record_failed();
                batch.halt(format!("worker for {id} died: {err}"), signal);
                self.recover_abandoned(dispatched, job, batch).await;
                batch.failures.push(RecordFailure {
                    id: id.clone(),
                    step: MigrationStep::Failed,
                    error: MigrationError::WorkerPanic(id),
                });
            }
        }

        if batch.fatal.is_none() && signal.should_stop() {
            if let Err(err) = scan.collect_remaining(&mut unvisited).await {
                batch.halt(format!("record scan failed: {err}"), signal);
                return;
            }
            unvisited.retain(|id| !seen.contains(id));
            if !unvisited.is_empty() {
                info!(records = unvisited.len(), "Run stopped before dispatching every record");
            }
            batch.undispatched = unvisited.len() as u64;
        }
    }

    /// Works out what a dead worker left behind for `dispatched`.
    ///
    /// A record that carries this run's write is queued for the batch revert;
    /// anything that cannot be read back is reported as unrecovered.
    async fn recover_abandoned(
        &self,
        dispatched: KeyRecord,
        job: &MigrationJob,
        batch: &mut BatchState,
    ) {
        let read = tokio::time::timeout(self.config.step_timeout, self.store.read(&dispatched.id))
            .await
            .unwrap_or(Err(StoreError::Timeout("read")));
        match read {
            Ok(current) if current.version == dispatched.version => {}
            Ok(current)
                if current.version == dispatched.version + 1
                    && current.status == KeyStatus::Migrated
                    && current.is_on(&job.target_spec) =>
            {
                warn!(record_id = %dispatched.id, "Dead worker left a stored key, queueing revert");
                batch.plan.push(RollbackEntry {
                    record_id: dispatched.id.clone(),
                    post_migration_version: current.version,
                    snapshot: dispatched,
                });
            }
            Ok(current) => {
                warn!(
                    record_id = %dispatched.id,
                    version = current.version,
                    "Dead worker left a record in an unknown state"
                );
                batch.unrecovered.push(dispatched.id);
            }
            Err(err) => {
                warn!(record_id = %dispatched.id, error = %err, "Dead worker's record could not be re-read");
                batch.unrecovered.push(dispatched.id);
            }
        }
    }

    /// Re-reads the migrated records and tallies the run for compliance.
    async fn inventory(&self, job: &MigrationJob, batch: &BatchState) -> InventoryStats {
        let plan = &batch.plan;
        let counts = job.counters.snapshot();
        let mut off_target = 0u64;

        for id in plan.record_ids() {
            let read = tokio::time::timeout(self.config.step_timeout, self.store.read(id))
                .await
                .unwrap_or(Err(StoreError::Timeout("read")));
            match read {
                Ok(record) if on_target(&record, &job.target_spec, &job.policy) => {}
                Ok(record) => {
                    warn!(record_id = %id, spec = %record.algorithm_spec, "Migrated record is off target");
                    off_target += 1;
                }
                Err(err) => {
                    warn!(record_id = %id, error = %err, "Migrated record could not be re-read");
                    off_target += 1;
                }
            }
        }

        InventoryStats {
            in_scope: counts.total + batch.undispatched,
            migrated: counts.processed,
            skipped: counts.skipped,
            failed: counts.failed,
            cancelled: counts.cancelled,
            off_target,
        }
    }

    async fn revert(
        &self,
        rollback: &RollbackStrategy<S>,
        plan: &RollbackPlan,
        job: &MigrationJob,
    ) -> Result<(), RollbackError> {
        if plan.is_empty() {
            return Ok(());
        }
        match rollback.revert(plan).await {
            Ok(summary) => {
                job.counters.add_rolled_back(summary.reverted as u64);
                Ok(())
            }
            Err(err) => {
                job.counters.add_rolled_back(err.reverted() as u64);
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        job: &MigrationJob,
        started: Instant,
        status: MigrationStatus,
        reason: Option<String>,
        batch: BatchState,
        unrecovered: Vec<RecordId>,
        policy_validated: bool,
    ) -> MigrationReport {
        let elapsed = started.elapsed();
        let counts = job.counters.snapshot();

        let claims = ProofClaims {
            job_id: job.job_id.clone(),
            source_spec: job.source_spec.clone(),
            target_spec: job.target_spec.clone(),
            policy: job.policy.name.clone(),
            status,
            policy_validated,
            counts,
            started_at_ms: job
                .started_at
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            issued_at_ms: now_millis(),
        };
        let proof = match self.signer.sign(claims) {
            Ok(proof) => {
                self.audit.log(
                    AuditEvent::new(MigrationOperation::ProofIssued, job.job_id.as_str())
                        .with_job(&job.job_id)
                        .with_details(format!("signer {}", proof.signer_public_key)),
                );
                Some(proof)
            }
            Err(err) => {
                error!(error = %err, "Proof of rotation could not be signed");
                None
            }
        };

        let report = MigrationReport {
            job_id: job.job_id.clone(),
            status,
            counts,
            reason,
            failures: batch.failures,
            unrecovered,
            proof,
            elapsed,
        };

        info!(
            target: "metrics",
            job_id = %job.job_id,
            status = %status,
            total = counts.total,
            processed = counts.processed,
            failed = counts.failed,
            skipped = counts.skipped,
            cancelled = counts.cancelled,
            security_checks = counts.security_checks,
            rolled_back = counts.rolled_back,
            elapsed_ms = elapsed.as_millis() as u64,
            throughput = report.throughput(),
            "Migration summary"
        );

        let event = AuditEvent::new(MigrationOperation::BatchComplete, job.job_id.as_str())
            .with_job(&job.job_id)
            .with_details(format!(
                "{status}: {} processed, {} failed, {} skipped, {} rolled back",
                counts.processed, counts.failed, counts.skipped, counts.rolled_back
            ));
        match &report.reason {
            Some(reason) if status != MigrationStatus::Success => {
                self.audit.log(event.with_error(reason.clone()))
            }
            _ => self.audit.log(event),
        }

        report
    }
}

fn on_target(record: &KeyRecord, target: &AlgorithmSpec, policy: &CompliancePolicy) -> bool {
    record.is_on(target)
        && record.status == KeyStatus::Migrated
        && (!policy.require_quantum_safe || record.algorithm_spec.quantum_safe)
}

/// Parameters for a one-shot migration.
#[derive(Debug, Clone)]
pub struct MigrationRequest {
    pub source_spec: AlgorithmSpec,
    pub target_spec: AlgorithmSpec,
    pub policy: CompliancePolicy,
    pub concurrency_limit: usize,
    /// Overall deadline for the run.
    pub timeout: Option<Duration>,
}

impl MigrationRequest {
    pub fn new(source_spec: AlgorithmSpec, target_spec: AlgorithmSpec, policy: CompliancePolicy) -> Self {
        Self {
            source_spec,
            target_spec,
            policy,
            concurrency_limit: MigrationConfig::default().concurrency_limit,
            timeout: None,
        }
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Applies the request's limits on top of `base`.
    pub fn config(&self, base: MigrationConfig) -> MigrationConfig {
        let config = base.with_concurrency_limit(self.concurrency_limit);
        match self.timeout {
            Some(timeout) => config.with_run_timeout(timeout),
            None => config,
        }
    }
}

/// Migrates every record on the request's source algorithm.
pub async fn run_migration<S, P>(
    store: Arc<S>,
    provider: Arc<P>,
    signer: ProofSigner,
    request: MigrationRequest,
    cancel: CancellationToken,
) -> Result<MigrationReport, ConfigError>
where
    S: KeyRecordStore + 'static,
    P: CryptoProvider + 'static,
{
    let config = request.config(MigrationConfig::default());
    let orchestrator = MigrationOrchestrator::new(store, provider, signer, config)?;
    let job = MigrationJob::new(request.source_spec, request.target_spec, request.policy);
    Ok(orchestrator.run(&job, cancel).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&MigrationStatus::ComplianceFailure).unwrap(),
            "\"compliance_failure\""
        );
        assert_eq!(MigrationStatus::RolledBack.to_string(), "rolled_back");
    }

    #[test]
    fn test_request_config() {
        let request = MigrationRequest::new(
            AlgorithmSpec::rsa2048(),
            AlgorithmSpec::hybrid_kyber768(),
            CompliancePolicy::nist_sp800_208(),
        )
        .with_concurrency_limit(4)
        .with_timeout(Duration::from_secs(5));

        let config = request.config(MigrationConfig::default());
        assert_eq!(config.concurrency_limit, 4);
        assert_eq!(config.run_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_report_json_marks_failed_records() {
        let report = MigrationReport {
            job_id: "job-1".to_string(),
            status: MigrationStatus::ComplianceFailure,
            counts: MetricsSnapshot::default(),
            reason: Some("ratio".to_string()),
            failures: vec![RecordFailure {
                id: RecordId::new("k7"),
                step: MigrationStep::Storing,
                error: MigrationError::ConcurrentModification(RecordId::new("k7")),
            }],
            unrecovered: Vec::new(),
            proof: None,
            elapsed: Duration::from_millis(5),
        };

        let json = report.to_json();
        assert_eq!(json["status"], "compliance_failure");
        assert_eq!(json["failures"][0]["status"], "failed");
        assert_eq!(json["failures"][0]["step"], "storing");
        assert_eq!(json["failures"][0]["id"], "k7");
    }

    #[test]
    fn test_on_target_requires_migrated_status() {
        let target = AlgorithmSpec::hybrid_kyber768();
        let policy = CompliancePolicy::nist_sp800_208();
        let mut record = KeyRecord::new("k", vec![], vec![], target.clone());
        assert!(!on_target(&record, &target, &policy));
        record.status = KeyStatus::Migrated;
        assert!(on_target(&record, &target, &policy));
    }
}
