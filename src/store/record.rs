// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key record types.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::algorithm::AlgorithmSpec;

/// Identifier of a key record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle status of a stored key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// In service under its current algorithm.
    Active,
    /// Mid-migration. Used in reports and logs; never written to a store.
    Migrating,
    /// Re-keyed under the target algorithm.
    Migrated,
    /// Pre-migration snapshot retained for legacy decryption.
    Archived,
    /// A migration attempt failed on this record. Used in reports; a failed
    /// record's row is left as it was.
    Failed,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Migrating => "migrating",
            KeyStatus::Migrated => "migrated",
            KeyStatus::Archived => "archived",
            KeyStatus::Failed => "failed",
        }
    }
}

/// A stored key record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: RecordId,
    pub public_key: Vec<u8>,
    /// Private key sealed under `algorithm_spec` by the crypto provider.
    pub encrypted_private_key: Vec<u8>,
    pub algorithm_spec: AlgorithmSpec,
    /// Incremented on every successful migration of this id.
    pub version: u64,
    pub status: KeyStatus,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    /// For archived rows, the id of the record this snapshot was taken from.
    #[serde(default)]
    pub archived_from: Option<RecordId>,
}

impl KeyRecord {
    /// Creates an active record at version 1.
    pub fn new(
        id: impl Into<RecordId>,
        public_key: Vec<u8>,
        encrypted_private_key: Vec<u8>,
        algorithm_spec: AlgorithmSpec,
    ) -> Self {
        Self {
            id: id.into(),
            public_key,
            encrypted_private_key,
            algorithm_spec,
            version: 1,
            status: KeyStatus::Active,
            created_at: now_millis(),
            archived_from: None,
        }
    }

    /// Returns true for archived snapshot rows.
    #[inline]
    pub fn is_archived(&self) -> bool {
        self.status == KeyStatus::Archived
    }

    /// Returns true if the record is already protected under `spec`.
    #[inline]
    pub fn is_on(&self, spec: &AlgorithmSpec) -> bool {
        &self.algorithm_spec == spec
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_active_v1() {
        let record = KeyRecord::new("k1", vec![1], vec![2], AlgorithmSpec::rsa2048());
        assert_eq!(record.version, 1);
        assert_eq!(record.status, KeyStatus::Active);
        assert!(record.archived_from.is_none());
        assert!(record.is_on(&AlgorithmSpec::rsa2048()));
        assert!(!record.is_on(&AlgorithmSpec::hybrid_kyber768()));
    }

    #[test]
    fn test_record_json_shape() {
        let record = KeyRecord::new("k1", vec![1], vec![2], AlgorithmSpec::rsa2048());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "k1");
        assert_eq!(json["status"], "active");
        assert_eq!(json["algorithm_spec"]["algorithm_type"], "rsa2048");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }
}
