// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Immutable algorithm specification values.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::AlgorithmType;

/// Describes the algorithm a key is (or will be) protected under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgorithmSpec {
    pub algorithm_type: AlgorithmType,
    /// Opaque parameter blob interpreted only by the crypto backend.
    #[serde(default)]
    pub parameters: Vec<u8>,
    /// NIST post-quantum security category (1..=5); 0 for unrated.
    pub nist_level: u8,
    pub quantum_safe: bool,
}

impl AlgorithmSpec {
    /// Creates a spec with empty parameters.
    pub fn new(algorithm_type: AlgorithmType, nist_level: u8, quantum_safe: bool) -> Self {
        Self {
            algorithm_type,
            parameters: Vec::new(),
            nist_level,
            quantum_safe,
        }
    }

    /// Attaches backend parameters.
    pub fn with_parameters(mut self, parameters: impl Into<Vec<u8>>) -> Self {
        self.parameters = parameters.into();
        self
    }

    pub fn rsa2048() -> Self {
        Self::new(AlgorithmType::Rsa2048, 1, false)
    }

    pub fn ecdsa_p256() -> Self {
        Self::new(AlgorithmType::EcdsaP256, 1, false)
    }

    pub fn x25519() -> Self {
        Self::new(AlgorithmType::X25519, 1, false)
    }

    pub fn aes256_gcm() -> Self {
        Self::new(AlgorithmType::Aes256Gcm, 5, true)
    }

    pub fn chacha20_poly1305() -> Self {
        Self::new(AlgorithmType::ChaCha20Poly1305, 5, true)
    }

    pub fn kyber768() -> Self {
        Self::new(AlgorithmType::Kyber768, 3, true)
    }

    pub fn dilithium3() -> Self {
        Self::new(AlgorithmType::Dilithium3, 3, true)
    }

    /// X25519 + Kyber768 hybrid, rated at category 5.
    pub fn hybrid_kyber768() -> Self {
        Self::new(AlgorithmType::HybridKyber768, 5, true)
    }

    pub fn hybrid_dilithium3() -> Self {
        Self::new(AlgorithmType::HybridDilithium3, 3, true)
    }

    /// Returns the preset spec for an algorithm type.
    pub fn preset(algorithm_type: AlgorithmType) -> Self {
        match algorithm_type {
            AlgorithmType::Rsa2048 => Self::rsa2048(),
            AlgorithmType::EcdsaP256 => Self::ecdsa_p256(),
            AlgorithmType::Aes256Gcm => Self::aes256_gcm(),
            AlgorithmType::X25519 => Self::x25519(),
            AlgorithmType::ChaCha20Poly1305 => Self::chacha20_poly1305(),
            AlgorithmType::Kyber768 => Self::kyber768(),
            AlgorithmType::Dilithium3 => Self::dilithium3(),
            AlgorithmType::HybridKyber768 => Self::hybrid_kyber768(),
            AlgorithmType::HybridDilithium3 => Self::hybrid_dilithium3(),
        }
    }

    /// Returns true if a key under `self` may be migrated to `target`.
    ///
    /// The NIST level is allowed to stay level or drop; only quantum safety is
    /// binding, and only when the migration is for quantum safety.
    pub fn can_migrate_to(&self, target: &AlgorithmSpec, require_quantum_safe: bool) -> bool {
        !require_quantum_safe || target.quantum_safe
    }
}

impl fmt::Display for AlgorithmSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(L{}{})",
            self.algorithm_type,
            self.nist_level,
            if self.quantum_safe { ", pq" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_match_their_type() {
        for algo in AlgorithmType::ALL {
            let spec = AlgorithmSpec::preset(algo);
            assert_eq!(spec.algorithm_type, algo);
            assert_eq!(spec.quantum_safe, algo.is_quantum_safe());
        }
    }

    #[test]
    fn test_quantum_purpose_requires_quantum_safe_target() {
        let rsa = AlgorithmSpec::rsa2048();
        assert!(rsa.can_migrate_to(&AlgorithmSpec::hybrid_kyber768(), true));
        assert!(!rsa.can_migrate_to(&AlgorithmSpec::ecdsa_p256(), true));
        assert!(rsa.can_migrate_to(&AlgorithmSpec::ecdsa_p256(), false));
    }

    #[test]
    fn test_lower_nist_level_is_allowed() {
        let source = AlgorithmSpec::hybrid_kyber768();
        assert!(source.can_migrate_to(&AlgorithmSpec::kyber768(), true));
    }

    #[test]
    fn test_parameters_are_part_of_identity() {
        let a = AlgorithmSpec::kyber768();
        let b = AlgorithmSpec::kyber768().with_parameters(b"v2".to_vec());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "kyber768(L3, pq)");
    }
}
