// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Compliance gating for migration targets and outcomes.
//!
//! A [`CompliancePolicy`] states what an algorithm spec must satisfy and what
//! share of the in-scope inventory must end up on it. Validation is pure: it
//! looks only at the spec, the policy, and the aggregate [`InventoryStats`].
//!
//! | Policy               | Quantum safe | Min NIST level | Min migrated |
//! |----------------------|--------------|----------------|--------------|
//! | `nist-sp800-208`     | yes          | 1              | 100%         |
//! | `cnsa-2.0`           | yes          | 5              | 100%         |
//! | `phased-rollout`     | yes          | 1              | 99%          |
//! | `fips140-classical`  | no           | 1              | 99%          |

mod policy;

pub use policy::{CompliancePolicy, PolicyName};

use crate::algorithm::AlgorithmSpec;

/// Errors raised by compliance validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComplianceError {
    #[error("policy {policy} violated: {reason}")]
    PolicyViolation { policy: String, reason: String },

    #[error("unknown compliance policy: {0}")]
    UnknownPolicy(String),
}

/// Aggregate outcome of a migration run, as seen by compliance checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryStats {
    /// Records the run was responsible for.
    pub in_scope: u64,
    /// Records re-keyed by this run.
    pub migrated: u64,
    /// Records already on the target spec.
    pub skipped: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Migrated records that, on re-read, are not on a compliant spec.
    pub off_target: u64,
}

impl InventoryStats {
    /// Share of in-scope records that are on the target spec.
    ///
    /// An empty scope counts as fully migrated.
    pub fn migrated_ratio(&self) -> f64 {
        if self.in_scope == 0 {
            return 1.0;
        }
        let compliant = (self.migrated + self.skipped).saturating_sub(self.off_target);
        compliant as f64 / self.in_scope as f64
    }
}

/// Evaluates specs and migration outcomes against a policy.
pub trait ComplianceValidator: Send + Sync {
    /// Checks that `spec` is an acceptable target under `policy`.
    fn validate(&self, spec: &AlgorithmSpec, policy: &CompliancePolicy)
        -> Result<(), ComplianceError>;

    /// Checks a completed run's inventory against `policy`.
    fn validate_inventory(
        &self,
        spec: &AlgorithmSpec,
        policy: &CompliancePolicy,
        stats: &InventoryStats,
    ) -> Result<(), ComplianceError>;
}

/// Standard validator applying the policy's thresholds.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyValidator;

impl PolicyValidator {
    pub fn new() -> Self {
        Self
    }
}

fn violation(policy: &CompliancePolicy, reason: String) -> ComplianceError {
    ComplianceError::PolicyViolation {
        policy: policy.name.clone(),
        reason,
    }
}

impl ComplianceValidator for PolicyValidator {
    fn validate(
        &self,
        spec: &AlgorithmSpec,
        policy: &CompliancePolicy,
    ) -> Result<(), ComplianceError> {
        if policy.require_quantum_safe && !spec.quantum_safe {
            return Err(violation(
                policy,
                format!("{} is not quantum safe", spec.algorithm_type),
            ));
        }

        if spec.nist_level < policy.min_nist_level {
            return Err(violation(
                policy,
                format!(
                    "{} is NIST level {}, policy requires {}",
                    spec.algorithm_type, spec.nist_level, policy.min_nist_level
                ),
            ));
        }

        if let Some(allowed) = &policy.allowed_algorithms {
            if !allowed.contains(&spec.algorithm_type) {
                return Err(violation(
                    policy,
                    format!("{} is not an allowed algorithm", spec.algorithm_type),
                ));
            }
        }

        Ok(())
    }

    fn validate_inventory(
        &self,
        spec: &AlgorithmSpec,
        policy: &CompliancePolicy,
        stats: &InventoryStats,
    ) -> Result<(), ComplianceError> {
        self.validate(spec, policy)?;

        if stats.off_target > 0 {
            return Err(violation(
                policy,
                format!(
                    "{} migrated records are not on {}",
                    stats.off_target, spec
                ),
            ));
        }

        let ratio = stats.migrated_ratio();
        if ratio < policy.min_migrated_ratio {
            return Err(violation(
                policy,
                format!(
                    "{:.2}% of in-scope keys migrated, policy requires {:.2}%",
                    ratio * 100.0,
                    policy.min_migrated_ratio * 100.0
                ),
            ));
        }

        Ok(())
    }
}
