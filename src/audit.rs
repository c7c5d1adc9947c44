// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Audit logging for key migration.
//!
//! Every state change a migration makes to the inventory is emitted as a
//! structured audit event, so an auditor can reconstruct which keys were
//! re-keyed, archived, or reverted by which job.
//!
//! # Event Categories
//!
//! - **Batch**: start, completion, compliance failure, proof issued
//! - **Record**: migrated, skipped, failed, archived, reverted
//! - **Rollback**: failures that need manual recovery
//!
//! # Example
//!
//! ```rust,no_run
//! use keymigrate::audit::{AuditLogger, AuditEvent, MigrationOperation};
//!
//! let logger = AuditLogger::new("keymigrate");
//! logger.log(AuditEvent::new(MigrationOperation::RecordMigrated, "key-123"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tracing::{info, warn};

/// Types of migration operations that are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOperation {
    BatchStart,
    BatchComplete,
    /// A record was re-keyed under the target algorithm.
    RecordMigrated,
    /// A record was already on the target spec.
    RecordSkipped,
    RecordFailed,
    /// A pre-migration snapshot was retained.
    RecordArchived,
    /// Old and new key material passed cross-compatibility checks.
    SecurityCheck,
    /// A migrated record was restored to its snapshot.
    RecordReverted,
    /// A revert could not be applied.
    RollbackFailed,
    ComplianceFailed,
    ProofIssued,
}

impl MigrationOperation {
    /// Returns the operation name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationOperation::BatchStart => "batch_start",
            MigrationOperation::BatchComplete => "batch_complete",
            MigrationOperation::RecordMigrated => "record_migrated",
            MigrationOperation::RecordSkipped => "record_skipped",
            MigrationOperation::RecordFailed => "record_failed",
            MigrationOperation::RecordArchived => "record_archived",
            MigrationOperation::SecurityCheck => "security_check",
            MigrationOperation::RecordReverted => "record_reverted",
            MigrationOperation::RollbackFailed => "rollback_failed",
            MigrationOperation::ComplianceFailed => "compliance_failed",
            MigrationOperation::ProofIssued => "proof_issued",
        }
    }

    /// Returns the severity level for this operation.
    pub fn severity(&self) -> AuditSeverity {
        match self {
            MigrationOperation::BatchStart
            | MigrationOperation::BatchComplete
            | MigrationOperation::RecordMigrated
            | MigrationOperation::RecordSkipped
            | MigrationOperation::RecordArchived
            | MigrationOperation::SecurityCheck
            | MigrationOperation::ProofIssued => AuditSeverity::Info,
            MigrationOperation::RecordFailed | MigrationOperation::RecordReverted => {
                AuditSeverity::Warning
            }
            MigrationOperation::ComplianceFailed => AuditSeverity::Error,
            MigrationOperation::RollbackFailed => AuditSeverity::Critical,
        }
    }
}

/// Severity levels for audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditSeverity {
    Info,
    /// Unusual but not critical.
    Warning,
    Error,
    /// Inventory may be inconsistent; manual recovery required.
    Critical,
}

impl AuditSeverity {
    /// Returns the severity as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Info => "INFO",
            AuditSeverity::Warning => "WARN",
            AuditSeverity::Error => "ERROR",
            AuditSeverity::Critical => "CRITICAL",
        }
    }
}

/// An audit event for a migration operation.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: u64,
    pub timestamp: SystemTime,
    pub operation: MigrationOperation,
    /// The record or job the event concerns.
    pub subject: String,
    /// Job that produced the event, if any.
    pub job_id: Option<String>,
    pub details: Option<String>,
    pub error: Option<String>,
}

impl AuditEvent {
    /// Creates a new audit event.
    pub fn new(operation: MigrationOperation, subject: impl Into<String>) -> Self {
        static EVENT_COUNTER: AtomicU64 = AtomicU64::new(0);

        Self {
            event_id: EVENT_COUNTER.fetch_add(1, Ordering::SeqCst),
            timestamp: SystemTime::now(),
            operation,
            subject: subject.into(),
            job_id: None,
            details: None,
            error: None,
        }
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns the severity of this event.
    ///
    /// An attached error raises informational operations to `Error`.
    pub fn severity(&self) -> AuditSeverity {
        let base = self.operation.severity();
        if self.error.is_some() {
            base.max(AuditSeverity::Error)
        } else {
            base
        }
    }
}

/// Audit logger for migration operations.
///
/// Emits structured events through `tracing` under the `audit` target.
pub struct AuditLogger {
    service_name: String,
    min_severity: AuditSeverity,
    emitted: AtomicU64,
}

impl AuditLogger {
    /// Creates a new audit logger.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            min_severity: AuditSeverity::Info,
            emitted: AtomicU64::new(0),
        }
    }

    /// Sets the minimum severity level to log.
    pub fn with_min_severity(mut self, severity: AuditSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Number of events emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Logs an audit event.
    pub fn log(&self, event: AuditEvent) {
        if event.severity() < self.min_severity {
            return;
        }
        self.emitted.fetch_add(1, Ordering::Relaxed);

        let timestamp = event
            .timestamp
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        match event.severity() {
            AuditSeverity::Info => {
                info!(
                    target: "audit",
                    event_id = event.event_id,
                    timestamp = timestamp,
                    service = %self.service_name,
                    operation = event.operation.as_str(),
                    subject = %event.subject,
                    job_id = ?event.job_id,
                    details = ?event.details,
                    "Migration operation completed"
                );
            }
            AuditSeverity::Warning => {
                warn!(
                    target: "audit",
                    event_id = event.event_id,
                    timestamp = timestamp,
                    service = %self.service_name,
                    operation = event.operation.as_str(),
                    subject = %event.subject,
                    job_id = ?event.job_id,
                    details = ?event.details,
                    error = ?event.error,
                    "Migration operation warning"
                );
            }
            AuditSeverity::Error | AuditSeverity::Critical => {
                tracing::error!(
                    target: "audit",
                    event_id = event.event_id,
                    timestamp = timestamp,
                    service = %self.service_name,
                    operation = event.operation.as_str(),
                    subject = %event.subject,
                    job_id = ?event.job_id,
                    details = ?event.details,
                    error = ?event.error,
                    severity = event.severity().as_str(),
                    "Migration operation failed"
                );
            }
        }
    }

    /// Creates an event and logs it immediately.
    pub fn log_operation(&self, operation: MigrationOperation, subject: impl Into<String>) {
        self.log(AuditEvent::new(operation, subject));
    }

    /// Logs a failed operation with an error.
    pub fn log_failure(
        &self,
        operation: MigrationOperation,
        subject: impl Into<String>,
        error: impl Into<String>,
    ) {
        self.log(AuditEvent::new(operation, subject).with_error(error));
    }
}
