// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Software algorithm backend.
//!
//! Seals private key material with AES-256-GCM under an in-memory master key,
//! binding the algorithm name as associated data so a key sealed for one
//! algorithm cannot be opened as another. Generated key pairs are random bytes
//! shaped to the algorithm's key lengths; they exercise the migration pipeline
//! end to end but are not usable RSA or lattice keys. Suitable for
//! development, testing, and dry runs over exported inventories.

use async_trait::async_trait;
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, NONCE_LEN};
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::algorithm::AlgorithmSpec;

use super::error::CryptoError;
use super::provider::{KeyPair, PublicKey, SecretKeyMaterial};
use super::table::AlgorithmBackend;

/// Size of AES-256 keys in bytes.
pub const AES_256_KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const AES_GCM_NONCE_SIZE: usize = 12;

/// Size of AES-GCM authentication tag in bytes.
pub const AES_GCM_TAG_SIZE: usize = 16;

#[derive(Zeroize, ZeroizeOnDrop)]
struct MasterKey {
    key: [u8; AES_256_KEY_SIZE],
}

/// Single-use nonce for one seal or open.
struct OneNonce {
    nonce: Option<[u8; NONCE_LEN]>,
}

impl NonceSequence for OneNonce {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        self.nonce
            .take()
            .ok_or(ring::error::Unspecified)
            .and_then(|n| Nonce::try_assume_unique_for_key(&n))
    }
}

/// Software [`AlgorithmBackend`] using `ring`.
pub struct SoftwareBackend {
    master_key: MasterKey,
    rng: SystemRandom,
}

impl SoftwareBackend {
    /// Creates a backend with the given master key.
    pub fn new(master_key: [u8; AES_256_KEY_SIZE]) -> Self {
        Self {
            master_key: MasterKey { key: master_key },
            rng: SystemRandom::new(),
        }
    }

    /// Creates a backend with a random master key.
    pub fn generate() -> Result<Self, CryptoError> {
        let rng = SystemRandom::new();
        let mut key = [0u8; AES_256_KEY_SIZE];
        rng.fill(&mut key)
            .map_err(|_| CryptoError::KeyGeneration("failed to generate master key".into()))?;
        Ok(Self::new(key))
    }

    /// Creates a backend from a hex-encoded master key.
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        let mut bytes = hex::decode(hex_key.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("master key is not hex: {}", e)))?;

        if bytes.len() != AES_256_KEY_SIZE {
            let got = bytes.len();
            bytes.zeroize();
            return Err(CryptoError::InvalidKey(format!(
                "master key must be {} bytes, got {}",
                AES_256_KEY_SIZE, got
            )));
        }

        let mut key = [0u8; AES_256_KEY_SIZE];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self::new(key))
    }

    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = vec![0u8; len];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| CryptoError::KeyGeneration("entropy source failed".into()))?;
        Ok(bytes)
    }

    /// Derives a deterministic public value of `len` bytes from a private key.
    fn derive_public(spec: &AlgorithmSpec, private: &[u8], len: usize) -> Vec<u8> {
        let mut public = Vec::with_capacity(len);
        let mut counter: u32 = 0;
        while public.len() < len {
            let mut ctx = digest::Context::new(&digest::SHA256);
            ctx.update(spec.algorithm_type.as_str().as_bytes());
            ctx.update(&counter.to_be_bytes());
            ctx.update(private);
            public.extend_from_slice(ctx.finish().as_ref());
            counter += 1;
        }
        public.truncate(len);
        public
    }

    fn seal(&self, spec: &AlgorithmSpec, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; AES_GCM_NONCE_SIZE];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::Encryption("failed to generate nonce".into()))?;

        let unbound_key = aead::UnboundKey::new(&aead::AES_256_GCM, &self.master_key.key)?;
        let mut sealing_key = aead::SealingKey::new(
            unbound_key,
            OneNonce {
                nonce: Some(nonce_bytes),
            },
        );

        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(
                Aad::from(spec.algorithm_type.as_str().as_bytes()),
                &mut in_out,
            )
            .map_err(|_| CryptoError::Encryption("AES-GCM seal failed".into()))?;

        let mut result = Vec::with_capacity(AES_GCM_NONCE_SIZE + in_out.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&in_out);
        in_out.zeroize();

        Ok(result)
    }

    fn open(&self, spec: &AlgorithmSpec, ciphertext: &[u8]) -> Result<SecretKeyMaterial, CryptoError> {
        if ciphertext.len() < AES_GCM_NONCE_SIZE + AES_GCM_TAG_SIZE {
            return Err(CryptoError::Decryption("ciphertext too short".into()));
        }

        let (nonce_bytes, encrypted) = ciphertext.split_at(AES_GCM_NONCE_SIZE);
        let mut nonce = [0u8; AES_GCM_NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);

        let unbound_key = aead::UnboundKey::new(&aead::AES_256_GCM, &self.master_key.key)?;
        let mut opening_key = aead::OpeningKey::new(unbound_key, OneNonce { nonce: Some(nonce) });

        let mut in_out = encrypted.to_vec();
        let plaintext = opening_key
            .open_in_place(
                Aad::from(spec.algorithm_type.as_str().as_bytes()),
                &mut in_out,
            )
            .map_err(|_| CryptoError::Decryption("AES-GCM open failed".into()))?
            .to_vec();
        in_out.zeroize();

        Ok(SecretKeyMaterial::new(plaintext))
    }
}

#[async_trait]
impl AlgorithmBackend for SoftwareBackend {
    async fn decrypt(
        &self,
        spec: &AlgorithmSpec,
        ciphertext: &[u8],
    ) -> Result<SecretKeyMaterial, CryptoError> {
        self.open(spec, ciphertext)
    }

    async fn generate(&self, spec: &AlgorithmSpec) -> Result<KeyPair, CryptoError> {
        let algorithm = spec.algorithm_type;
        let private = SecretKeyMaterial::new(self.random_bytes(algorithm.private_key_len())?);
        let public = Self::derive_public(spec, private.expose(), algorithm.public_key_len());

        Ok(KeyPair {
            public: PublicKey::new(algorithm, public),
            private,
        })
    }

    async fn encrypt(
        &self,
        spec: &AlgorithmSpec,
        plaintext: &SecretKeyMaterial,
    ) -> Result<Vec<u8>, CryptoError> {
        self.seal(spec, plaintext.expose())
    }
}
