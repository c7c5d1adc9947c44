// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Crypto provider error types.

use crate::algorithm::AlgorithmType;

/// Errors returned by crypto providers and backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CryptoError {
    /// No backend is registered for the algorithm.
    #[error("no {operation} capability for {algorithm}")]
    Unsupported {
        algorithm: AlgorithmType,
        operation: &'static str,
    },

    /// Ciphertext could not be opened.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Key generation failed. Usually entropy or transport related.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Sealing key material failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Key material does not have the expected shape.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Underlying primitive failure.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl CryptoError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CryptoError::KeyGeneration(_))
    }
}

impl From<ring::error::Unspecified> for CryptoError {
    fn from(_: ring::error::Unspecified) -> Self {
        CryptoError::Crypto("unspecified cryptographic error".to_string())
    }
}
