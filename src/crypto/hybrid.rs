// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hybrid key binding.
//!
//! A hybrid key is stored as one blob so that the classical and post-quantum
//! halves can never be separated or swapped independently:
//!
//! `[magic "HYB1"][classical_len:u32 BE][classical bytes][post-quantum bytes]`

use async_trait::async_trait;
use std::sync::Arc;

use crate::algorithm::{AlgorithmSpec, AlgorithmType};

use super::error::CryptoError;
use super::provider::{KeyPair, PublicKey, SecretKeyMaterial};
use super::table::AlgorithmBackend;

const MAGIC: &[u8; 4] = b"HYB1";
const HEADER_LEN: usize = MAGIC.len() + 4;

/// Borrowed view of the two halves of a hybrid blob.
#[derive(Debug, PartialEq, Eq)]
pub struct HybridKey<'a> {
    pub classical: &'a [u8],
    pub post_quantum: &'a [u8],
}

impl<'a> HybridKey<'a> {
    /// Encodes two components into one blob.
    pub fn encode(classical: &[u8], post_quantum: &[u8]) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(HEADER_LEN + classical.len() + post_quantum.len());
        encoded.extend_from_slice(MAGIC);
        encoded.extend_from_slice(&(classical.len() as u32).to_be_bytes());
        encoded.extend_from_slice(classical);
        encoded.extend_from_slice(post_quantum);
        encoded
    }

    /// Splits a blob produced by [`HybridKey::encode`].
    pub fn decode(encoded: &'a [u8]) -> Result<Self, CryptoError> {
        if encoded.len() < HEADER_LEN || &encoded[..MAGIC.len()] != MAGIC {
            return Err(CryptoError::InvalidKey("missing hybrid header".into()));
        }

        let len_bytes = &encoded[MAGIC.len()..HEADER_LEN];
        let classical_len =
            u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;

        let body = &encoded[HEADER_LEN..];
        if body.len() < classical_len {
            return Err(CryptoError::InvalidKey(format!(
                "classical component truncated: need {} bytes, have {}",
                classical_len,
                body.len()
            )));
        }

        let (classical, post_quantum) = body.split_at(classical_len);
        Ok(Self {
            classical,
            post_quantum,
        })
    }

    /// Checks both halves against the component algorithms' expected lengths.
    pub fn check_lengths(&self, hybrid: AlgorithmType, public: bool) -> Result<(), CryptoError> {
        let (classical, pq) = hybrid.hybrid_components().ok_or_else(|| {
            CryptoError::InvalidKey(format!("{} is not a hybrid algorithm", hybrid))
        })?;

        let expected = |algo: AlgorithmType| {
            if public {
                algo.public_key_len()
            } else {
                algo.private_key_len()
            }
        };

        if self.classical.len() != expected(classical) {
            return Err(CryptoError::InvalidKey(format!(
                "{} component is {} bytes, expected {}",
                classical,
                self.classical.len(),
                expected(classical)
            )));
        }
        if self.post_quantum.len() != expected(pq) {
            return Err(CryptoError::InvalidKey(format!(
                "{} component is {} bytes, expected {}",
                pq,
                self.post_quantum.len(),
                expected(pq)
            )));
        }
        Ok(())
    }
}

/// Composes a classical and a post-quantum backend into one hybrid backend.
pub struct HybridBackend {
    classical: Arc<dyn AlgorithmBackend>,
    post_quantum: Arc<dyn AlgorithmBackend>,
}

impl HybridBackend {
    pub fn new(classical: Arc<dyn AlgorithmBackend>, post_quantum: Arc<dyn AlgorithmBackend>) -> Self {
        Self {
            classical,
            post_quantum,
        }
    }

    fn component_specs(spec: &AlgorithmSpec) -> Result<(AlgorithmSpec, AlgorithmSpec), CryptoError> {
        let (classical, pq) = spec.algorithm_type.hybrid_components().ok_or_else(|| {
            CryptoError::Unsupported {
                algorithm: spec.algorithm_type,
                operation: "hybrid",
            }
        })?;
        Ok((AlgorithmSpec::preset(classical), AlgorithmSpec::preset(pq)))
    }
}

#[async_trait]
impl AlgorithmBackend for HybridBackend {
    async fn decrypt(
        &self,
        spec: &AlgorithmSpec,
        ciphertext: &[u8],
    ) -> Result<SecretKeyMaterial, CryptoError> {
        let (classical_spec, pq_spec) = Self::component_specs(spec)?;
        let sealed = HybridKey::decode(ciphertext)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;

        let classical = self.classical.decrypt(&classical_spec, sealed.classical).await?;
        let post_quantum = self.post_quantum.decrypt(&pq_spec, sealed.post_quantum).await?;

        Ok(SecretKeyMaterial::new(HybridKey::encode(
            classical.expose(),
            post_quantum.expose(),
        )))
    }

    async fn generate(&self, spec: &AlgorithmSpec) -> Result<KeyPair, CryptoError> {
        let (classical_spec, pq_spec) = Self::component_specs(spec)?;

        let classical = self.classical.generate(&classical_spec).await?;
        let post_quantum = self.post_quantum.generate(&pq_spec).await?;

        Ok(KeyPair {
            public: PublicKey::new(
                spec.algorithm_type,
                HybridKey::encode(&classical.public.bytes, &post_quantum.public.bytes),
            ),
            private: SecretKeyMaterial::new(HybridKey::encode(
                classical.private.expose(),
                post_quantum.private.expose(),
            )),
        })
    }

    async fn encrypt(
        &self,
        spec: &AlgorithmSpec,
        plaintext: &SecretKeyMaterial,
    ) -> Result<Vec<u8>, CryptoError> {
        let (classical_spec, pq_spec) = Self::component_specs(spec)?;
        let parts = HybridKey::decode(plaintext.expose())?;

        let classical = SecretKeyMaterial::new(parts.classical.to_vec());
        let post_quantum = SecretKeyMaterial::new(parts.post_quantum.to_vec());

        let sealed_classical = self.classical.encrypt(&classical_spec, &classical).await?;
        let sealed_pq = self.post_quantum.encrypt(&pq_spec, &post_quantum).await?;

        Ok(HybridKey::encode(&sealed_classical, &sealed_pq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let blob = HybridKey::encode(b"abc", b"defgh");
        let key = HybridKey::decode(&blob).unwrap();
        assert_eq!(key.classical, b"abc");
        assert_eq!(key.post_quantum, b"defgh");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(HybridKey::decode(b"nope").is_err());
        assert!(HybridKey::decode(b"XXXX\0\0\0\x01a").is_err());

        let mut truncated = HybridKey::encode(b"abcdef", b"");
        truncated.truncate(HEADER_LEN + 2);
        assert!(HybridKey::decode(&truncated).is_err());
    }

    #[test]
    fn test_check_lengths() {
        let classical = vec![0u8; 32];
        let pq = vec![0u8; 1184];
        let blob = HybridKey::encode(&classical, &pq);
        let key = HybridKey::decode(&blob).unwrap();

        assert!(key.check_lengths(AlgorithmType::HybridKyber768, true).is_ok());
        assert!(key.check_lengths(AlgorithmType::HybridKyber768, false).is_err());
        assert!(key.check_lengths(AlgorithmType::Kyber768, true).is_err());
    }
}
