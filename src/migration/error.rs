// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Error types for migration runs.

use crate::compliance::ComplianceError;
use crate::crypto::CryptoError;
use crate::store::{RecordId, StoreError};

use super::migrator::MigrationStep;
use super::rollback::RollbackError;

/// How an error affects the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retried locally; surfaces as a record failure once retries run out.
    Transient,
    /// Fails one record; siblings continue.
    Record,
    /// Halts the batch and rolls it back.
    Fatal,
    /// Compliance gate failed; the batch is rolled back.
    Policy,
}

/// Errors raised while migrating records.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("legacy key could not be decrypted: {0}")]
    LegacyDecryption(#[source] CryptoError),

    #[error("key generation failed after {attempts} attempt(s): {source}")]
    KeyGeneration { attempts: u32, source: CryptoError },

    #[error("new key is incompatible: {0}")]
    Compatibility(String),

    #[error("new key could not be sealed: {0}")]
    Sealing(#[source] CryptoError),

    #[error("record {0} was modified concurrently")]
    ConcurrentModification(RecordId),

    #[error("record is not eligible for migration: {0}")]
    Ineligible(String),

    #[error("archival failed: {0}")]
    Archival(#[source] StoreError),

    #[error("archival failed and the record could not be reverted: {0}")]
    RevertFailed(#[source] RollbackError),

    #[error("store error: {0}")]
    Store(#[source] StoreError),

    #[error("{step} timed out")]
    Timeout { step: MigrationStep },

    #[error("compliance check failed: {0}")]
    Compliance(#[from] ComplianceError),

    #[error("worker for record {0} panicked")]
    WorkerPanic(RecordId),
}

impl MigrationError {
    /// Classifies the error for batch handling.
    pub fn class(&self) -> ErrorClass {
        match self {
            MigrationError::KeyGeneration { .. } => ErrorClass::Transient,
            MigrationError::LegacyDecryption(_)
            | MigrationError::Compatibility(_)
            | MigrationError::Sealing(_)
            | MigrationError::ConcurrentModification(_)
            | MigrationError::Ineligible(_) => ErrorClass::Record,
            MigrationError::Store(err) => {
                if err.is_unavailable() {
                    ErrorClass::Fatal
                } else {
                    ErrorClass::Record
                }
            }
            MigrationError::Timeout { step } => match step {
                MigrationStep::Storing | MigrationStep::Archiving => ErrorClass::Fatal,
                _ => ErrorClass::Record,
            },
            MigrationError::Archival(_)
            | MigrationError::RevertFailed(_)
            | MigrationError::WorkerPanic(_) => ErrorClass::Fatal,
            MigrationError::Compliance(_) => ErrorClass::Policy,
        }
    }

    /// Returns true if the error halts the batch.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

/// Errors raised by proof-of-rotation signing and verification.
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("proof signing key rejected: {0}")]
    InvalidSigningKey(String),

    #[error("proof signature does not verify")]
    BadSignature,

    #[error("proof encoding error: {0}")]
    Encoding(String),

    #[error("proof serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<hex::FromHexError> for ProofError {
    fn from(err: hex::FromHexError) -> Self {
        ProofError::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_split_by_availability() {
        let missing = MigrationError::Store(StoreError::NotFound(RecordId::new("k1")));
        assert_eq!(missing.class(), ErrorClass::Record);

        let down = MigrationError::Store(StoreError::Unavailable("disk".into()));
        assert!(down.is_fatal());
    }

    #[test]
    fn test_store_step_timeouts_are_fatal() {
        assert!(MigrationError::Timeout {
            step: MigrationStep::Archiving
        }
        .is_fatal());
        assert_eq!(
            MigrationError::Timeout {
                step: MigrationStep::Decrypting
            }
            .class(),
            ErrorClass::Record
        );
    }

    #[test]
    fn test_conflict_is_a_record_failure() {
        let err = MigrationError::ConcurrentModification(RecordId::new("k7"));
        assert_eq!(err.class(), ErrorClass::Record);
        assert_eq!(err.to_string(), "record k7 was modified concurrently");
    }
}
