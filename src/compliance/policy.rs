// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Named compliance policies.

use std::fmt;
use std::str::FromStr;

use crate::algorithm::AlgorithmType;

use super::ComplianceError;

/// Well-known policy names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyName {
    /// NIST SP 800-208: quantum-safe targets, full migration.
    NistSp800_208,
    /// CNSA 2.0: quantum-safe at NIST level 5, full migration.
    Cnsa2,
    /// Quantum-safe targets, at least 99% migrated.
    PhasedRollout,
    /// Classical FIPS 140 targets, at least 99% migrated.
    Fips140Classical,
}

impl PolicyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyName::NistSp800_208 => "nist-sp800-208",
            PolicyName::Cnsa2 => "cnsa-2.0",
            PolicyName::PhasedRollout => "phased-rollout",
            PolicyName::Fips140Classical => "fips140-classical",
        }
    }

    /// Returns the thresholds for this policy.
    pub fn policy(&self) -> CompliancePolicy {
        match self {
            PolicyName::NistSp800_208 => CompliancePolicy::nist_sp800_208(),
            PolicyName::Cnsa2 => CompliancePolicy::cnsa2(),
            PolicyName::PhasedRollout => CompliancePolicy::phased_rollout(),
            PolicyName::Fips140Classical => CompliancePolicy::fips140_classical(),
        }
    }
}

impl fmt::Display for PolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyName {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            PolicyName::NistSp800_208,
            PolicyName::Cnsa2,
            PolicyName::PhasedRollout,
            PolicyName::Fips140Classical,
        ]
        .into_iter()
        .find(|p| p.as_str() == s)
        .ok_or_else(|| ComplianceError::UnknownPolicy(s.to_string()))
    }
}

/// Thresholds a migration target and outcome must meet.
#[derive(Debug, Clone, PartialEq)]
pub struct CompliancePolicy {
    pub name: String,
    pub require_quantum_safe: bool,
    pub min_nist_level: u8,
    /// Fraction of in-scope keys, in `[0, 1]`, that must end on the target.
    pub min_migrated_ratio: f64,
    /// If set, only these target algorithms are accepted.
    pub allowed_algorithms: Option<Vec<AlgorithmType>>,
}

impl CompliancePolicy {
    pub fn nist_sp800_208() -> Self {
        Self {
            name: PolicyName::NistSp800_208.as_str().to_string(),
            require_quantum_safe: true,
            min_nist_level: 1,
            min_migrated_ratio: 1.0,
            allowed_algorithms: None,
        }
    }

    pub fn cnsa2() -> Self {
        Self {
            name: PolicyName::Cnsa2.as_str().to_string(),
            require_quantum_safe: true,
            min_nist_level: 5,
            min_migrated_ratio: 1.0,
            allowed_algorithms: None,
        }
    }

    pub fn phased_rollout() -> Self {
        Self {
            name: PolicyName::PhasedRollout.as_str().to_string(),
            require_quantum_safe: true,
            min_nist_level: 1,
            min_migrated_ratio: 0.99,
            allowed_algorithms: None,
        }
    }

    pub fn fips140_classical() -> Self {
        Self {
            name: PolicyName::Fips140Classical.as_str().to_string(),
            require_quantum_safe: false,
            min_nist_level: 1,
            min_migrated_ratio: 0.99,
            allowed_algorithms: None,
        }
    }

    /// Starts a custom policy with strict defaults.
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::nist_sp800_208()
        }
    }

    pub fn with_min_nist_level(mut self, level: u8) -> Self {
        self.min_nist_level = level;
        self
    }

    pub fn with_min_migrated_ratio(mut self, ratio: f64) -> Self {
        self.min_migrated_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_quantum_safe(mut self, required: bool) -> Self {
        self.require_quantum_safe = required;
        self
    }

    pub fn with_allowed_algorithms(mut self, allowed: Vec<AlgorithmType>) -> Self {
        self.allowed_algorithms = Some(allowed);
        self
    }
}

impl From<PolicyName> for CompliancePolicy {
    fn from(name: PolicyName) -> Self {
        name.policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("cnsa-2.0".parse::<PolicyName>().unwrap(), PolicyName::Cnsa2);
        assert_eq!(
            "nist-sp800-208".parse::<PolicyName>().unwrap().policy().min_migrated_ratio,
            1.0
        );
        assert!(matches!(
            "pci".parse::<PolicyName>(),
            Err(ComplianceError::UnknownPolicy(_))
        ));
    }

    #[test]
    fn test_custom_ratio_is_clamped() {
        let policy = CompliancePolicy::custom("lenient").with_min_migrated_ratio(1.5);
        assert_eq!(policy.min_migrated_ratio, 1.0);
        assert!(policy.require_quantum_safe);
    }
}
