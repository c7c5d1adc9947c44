// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Capability table: algorithm tag → backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::algorithm::{AlgorithmSpec, AlgorithmType};

use super::error::CryptoError;
use super::hybrid::{HybridBackend, HybridKey};
use super::provider::{CryptoProvider, KeyPair, PublicKey, SecretKeyMaterial};
use super::software::SoftwareBackend;

/// The operations one algorithm family supports.
#[async_trait]
pub trait AlgorithmBackend: Send + Sync {
    async fn decrypt(
        &self,
        spec: &AlgorithmSpec,
        ciphertext: &[u8],
    ) -> Result<SecretKeyMaterial, CryptoError>;

    async fn generate(&self, spec: &AlgorithmSpec) -> Result<KeyPair, CryptoError>;

    async fn encrypt(
        &self,
        spec: &AlgorithmSpec,
        plaintext: &SecretKeyMaterial,
    ) -> Result<Vec<u8>, CryptoError>;
}

/// A [`CryptoProvider`] that dispatches on [`AlgorithmType`].
///
/// Algorithms without a registered backend fail with
/// [`CryptoError::Unsupported`].
#[derive(Default, Clone)]
pub struct CapabilityTable {
    backends: HashMap<AlgorithmType, Arc<dyn AlgorithmBackend>>,
}

impl CapabilityTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the backend for `algorithm`.
    pub fn with_backend(mut self, algorithm: AlgorithmType, backend: Arc<dyn AlgorithmBackend>) -> Self {
        self.backends.insert(algorithm, backend);
        self
    }

    /// Removes the backend for `algorithm`.
    pub fn without(mut self, algorithm: AlgorithmType) -> Self {
        self.backends.remove(&algorithm);
        self
    }

    /// Builds a table serving every algorithm from one software backend.
    ///
    /// Hybrids are composed from the same backend's component algorithms.
    pub fn software(backend: SoftwareBackend) -> Self {
        let backend: Arc<dyn AlgorithmBackend> = Arc::new(backend);
        let hybrid: Arc<dyn AlgorithmBackend> =
            Arc::new(HybridBackend::new(Arc::clone(&backend), Arc::clone(&backend)));

        AlgorithmType::ALL
            .into_iter()
            .fold(Self::new(), |table, algorithm| {
                if algorithm.hybrid_components().is_some() {
                    table.with_backend(algorithm, Arc::clone(&hybrid))
                } else {
                    table.with_backend(algorithm, Arc::clone(&backend))
                }
            })
    }

    /// Returns true if `algorithm` has a backend.
    pub fn supports(&self, algorithm: AlgorithmType) -> bool {
        self.backends.contains_key(&algorithm)
    }

    fn backend(
        &self,
        algorithm: AlgorithmType,
        operation: &'static str,
    ) -> Result<&Arc<dyn AlgorithmBackend>, CryptoError> {
        self.backends
            .get(&algorithm)
            .ok_or(CryptoError::Unsupported {
                algorithm,
                operation,
            })
    }
}

/// Checks a public key against its algorithm's expected shape.
pub fn check_public_key(public: &PublicKey) -> Result<(), CryptoError> {
    if public.algorithm.hybrid_components().is_some() {
        return HybridKey::decode(&public.bytes)?.check_lengths(public.algorithm, true);
    }

    let expected = public.algorithm.public_key_len();
    if public.bytes.len() != expected {
        return Err(CryptoError::InvalidKey(format!(
            "{} public key is {} bytes, expected {}",
            public.algorithm,
            public.bytes.len(),
            expected
        )));
    }
    Ok(())
}

#[async_trait]
impl CryptoProvider for CapabilityTable {
    async fn decrypt(
        &self,
        spec: &AlgorithmSpec,
        ciphertext: &[u8],
    ) -> Result<SecretKeyMaterial, CryptoError> {
        self.backend(spec.algorithm_type, "decrypt")?
            .decrypt(spec, ciphertext)
            .await
    }

    async fn generate(&self, spec: &AlgorithmSpec) -> Result<KeyPair, CryptoError> {
        self.backend(spec.algorithm_type, "generate")?
            .generate(spec)
            .await
    }

    async fn verify_compatibility(
        &self,
        old_public: &PublicKey,
        new_public: &PublicKey,
    ) -> Result<bool, CryptoError> {
        self.backend(new_public.algorithm, "verify")?;

        if new_public.bytes == old_public.bytes {
            debug!(algorithm = %new_public.algorithm, "new public key reuses legacy key bytes");
            return Ok(false);
        }
        Ok(check_public_key(new_public).is_ok())
    }

    async fn encrypt(
        &self,
        spec: &AlgorithmSpec,
        plaintext: &SecretKeyMaterial,
    ) -> Result<Vec<u8>, CryptoError> {
        self.backend(spec.algorithm_type, "encrypt")?
            .encrypt(spec, plaintext)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CapabilityTable {
        CapabilityTable::software(SoftwareBackend::generate().unwrap())
    }

    #[tokio::test]
    async fn test_missing_capability_is_unsupported() {
        let table = table().without(AlgorithmType::Rsa2048);
        let err = table
            .decrypt(&AlgorithmSpec::rsa2048(), b"whatever")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CryptoError::Unsupported {
                algorithm: AlgorithmType::Rsa2048,
                operation: "decrypt"
            }
        ));
        assert!(!table.supports(AlgorithmType::Rsa2048));
    }

    #[tokio::test]
    async fn test_hybrid_generate_binds_both_components() {
        let table = table();
        let pair = table
            .generate(&AlgorithmSpec::hybrid_kyber768())
            .await
            .unwrap();

        assert_eq!(pair.public.algorithm, AlgorithmType::HybridKyber768);
        check_public_key(&pair.public).unwrap();

        let private = HybridKey::decode(pair.private.expose()).unwrap();
        private
            .check_lengths(AlgorithmType::HybridKyber768, false)
            .unwrap();
    }

    #[tokio::test]
    async fn test_hybrid_seal_and_open() {
        let table = table();
        let spec = AlgorithmSpec::hybrid_kyber768();
        let pair = table.generate(&spec).await.unwrap();

        let sealed = table.encrypt(&spec, &pair.private).await.unwrap();
        let opened = table.decrypt(&spec, &sealed).await.unwrap();
        assert_eq!(opened.expose(), pair.private.expose());
    }

    #[tokio::test]
    async fn test_verify_compatibility() {
        let table = table();
        let old = table.generate(&AlgorithmSpec::rsa2048()).await.unwrap();
        let new = table
            .generate(&AlgorithmSpec::hybrid_kyber768())
            .await
            .unwrap();

        assert!(table
            .verify_compatibility(&old.public, &new.public)
            .await
            .unwrap());
        assert!(!table
            .verify_compatibility(&new.public, &new.public)
            .await
            .unwrap());

        let malformed = PublicKey::new(AlgorithmType::HybridKyber768, vec![1, 2, 3]);
        assert!(!table
            .verify_compatibility(&old.public, &malformed)
            .await
            .unwrap());
    }
}
