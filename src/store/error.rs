// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key record store error types.

use super::RecordId;

/// Errors that can occur in key record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(RecordId),

    #[error("record already exists: {0}")]
    AlreadyExists(RecordId),

    #[error("version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: RecordId,
        expected: u64,
        actual: u64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out: {0}")]
    Timeout(&'static str),

    #[error("storage corruption: {0}")]
    Corruption(String),

    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl StoreError {
    /// Returns true if the error means the store itself cannot be trusted to
    /// serve further requests, as opposed to a problem with one record.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_)
                | StoreError::Timeout(_)
                | StoreError::Io(_)
                | StoreError::RocksDb(_)
                | StoreError::Corruption(_)
        )
    }
}
