// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The algorithm tag and its static properties.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad class of an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmFamily {
    /// Public/private key pair (signature or key agreement).
    Asymmetric,
    /// Single secret key.
    Symmetric,
    /// Classical and post-quantum components bound as one logical key.
    Hybrid,
}

/// Tagged algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmType {
    Rsa2048,
    EcdsaP256,
    Aes256Gcm,
    X25519,
    ChaCha20Poly1305,
    Kyber768,
    Dilithium3,
    /// X25519 + Kyber768.
    HybridKyber768,
    /// ECDSA P-256 + Dilithium3.
    HybridDilithium3,
}

impl AlgorithmType {
    /// All known algorithm types.
    pub const ALL: [AlgorithmType; 9] = [
        AlgorithmType::Rsa2048,
        AlgorithmType::EcdsaP256,
        AlgorithmType::Aes256Gcm,
        AlgorithmType::X25519,
        AlgorithmType::ChaCha20Poly1305,
        AlgorithmType::Kyber768,
        AlgorithmType::Dilithium3,
        AlgorithmType::HybridKyber768,
        AlgorithmType::HybridDilithium3,
    ];

    /// Returns the stable name used in logs, storage and CLI arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmType::Rsa2048 => "rsa2048",
            AlgorithmType::EcdsaP256 => "ecdsa_p256",
            AlgorithmType::Aes256Gcm => "aes256_gcm",
            AlgorithmType::X25519 => "x25519",
            AlgorithmType::ChaCha20Poly1305 => "chacha20_poly1305",
            AlgorithmType::Kyber768 => "kyber768",
            AlgorithmType::Dilithium3 => "dilithium3",
            AlgorithmType::HybridKyber768 => "hybrid_kyber768",
            AlgorithmType::HybridDilithium3 => "hybrid_dilithium3",
        }
    }

    /// Parses a name produced by [`AlgorithmType::as_str`].
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Returns the family this algorithm belongs to.
    pub fn family(&self) -> AlgorithmFamily {
        match self {
            AlgorithmType::Aes256Gcm | AlgorithmType::ChaCha20Poly1305 => {
                AlgorithmFamily::Symmetric
            }
            AlgorithmType::HybridKyber768 | AlgorithmType::HybridDilithium3 => {
                AlgorithmFamily::Hybrid
            }
            _ => AlgorithmFamily::Asymmetric,
        }
    }

    /// Returns true if the algorithm resists known quantum attacks.
    ///
    /// 256-bit symmetric ciphers retain 128-bit security under Grover.
    pub fn is_quantum_safe(&self) -> bool {
        matches!(
            self,
            AlgorithmType::Kyber768
                | AlgorithmType::Dilithium3
                | AlgorithmType::HybridKyber768
                | AlgorithmType::HybridDilithium3
                | AlgorithmType::Aes256Gcm
                | AlgorithmType::ChaCha20Poly1305
        )
    }

    /// Returns the `(classical, post_quantum)` components of a hybrid scheme.
    pub fn hybrid_components(&self) -> Option<(AlgorithmType, AlgorithmType)> {
        match self {
            AlgorithmType::HybridKyber768 => {
                Some((AlgorithmType::X25519, AlgorithmType::Kyber768))
            }
            AlgorithmType::HybridDilithium3 => {
                Some((AlgorithmType::EcdsaP256, AlgorithmType::Dilithium3))
            }
            _ => None,
        }
    }

    /// Expected encoded public key length in bytes.
    ///
    /// Symmetric algorithms carry a key identifier digest instead of a public key.
    /// Hybrid lengths exclude the binding header, see [`crate::crypto::HybridKey`].
    pub fn public_key_len(&self) -> usize {
        match self {
            AlgorithmType::Rsa2048 => 256,
            AlgorithmType::EcdsaP256 => 65,
            AlgorithmType::X25519 => 32,
            AlgorithmType::Aes256Gcm | AlgorithmType::ChaCha20Poly1305 => 32,
            AlgorithmType::Kyber768 => 1184,
            AlgorithmType::Dilithium3 => 1952,
            AlgorithmType::HybridKyber768 | AlgorithmType::HybridDilithium3 => {
                match self.hybrid_components() {
                    Some((classical, pq)) => classical.public_key_len() + pq.public_key_len(),
                    None => 0,
                }
            }
        }
    }

    /// Expected raw private key length in bytes.
    pub fn private_key_len(&self) -> usize {
        match self {
            AlgorithmType::Rsa2048 => 1192,
            AlgorithmType::EcdsaP256 => 32,
            AlgorithmType::X25519 => 32,
            AlgorithmType::Aes256Gcm | AlgorithmType::ChaCha20Poly1305 => 32,
            AlgorithmType::Kyber768 => 2400,
            AlgorithmType::Dilithium3 => 4032,
            AlgorithmType::HybridKyber768 | AlgorithmType::HybridDilithium3 => {
                match self.hybrid_components() {
                    Some((classical, pq)) => classical.private_key_len() + pq.private_key_len(),
                    None => 0,
                }
            }
        }
    }
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
