// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Crypto provider trait and key material types.

use async_trait::async_trait;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::algorithm::{AlgorithmSpec, AlgorithmType};

use super::error::CryptoError;

/// Plaintext private key material.
///
/// Zeroized on drop. Never serialized and never logged.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyMaterial {
    bytes: Vec<u8>,
}

impl SecretKeyMaterial {
    /// Takes ownership of raw key bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Returns the key material.
    ///
    /// # Security
    ///
    /// The returned slice is zeroized when this value is dropped. Do not
    /// store copies.
    #[inline]
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for SecretKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKeyMaterial")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Public half of a key, tagged with its algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub algorithm: AlgorithmType,
    pub bytes: Vec<u8>,
}

impl PublicKey {
    pub fn new(algorithm: AlgorithmType, bytes: Vec<u8>) -> Self {
        Self { algorithm, bytes }
    }
}

/// A freshly generated key pair.
#[derive(Debug)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: SecretKeyMaterial,
}

/// Capability interface to key decryption, generation, verification and sealing.
///
/// The migration engine never performs cryptography itself; it calls this
/// trait. Implementations may front an HSM, a cloud KMS, or a local library,
/// so every operation is async.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Recovers plaintext private key material sealed under `spec`.
    async fn decrypt(
        &self,
        spec: &AlgorithmSpec,
        ciphertext: &[u8],
    ) -> Result<SecretKeyMaterial, CryptoError>;

    /// Generates a new key pair under `spec`.
    ///
    /// Hybrid specs yield one logical key binding both components.
    async fn generate(&self, spec: &AlgorithmSpec) -> Result<KeyPair, CryptoError>;

    /// Checks that `new_public` may replace `old_public`.
    async fn verify_compatibility(
        &self,
        old_public: &PublicKey,
        new_public: &PublicKey,
    ) -> Result<bool, CryptoError>;

    /// Seals private key material under `spec` for storage.
    async fn encrypt(
        &self,
        spec: &AlgorithmSpec,
        plaintext: &SecretKeyMaterial,
    ) -> Result<Vec<u8>, CryptoError>;
}
