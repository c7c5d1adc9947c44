// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Crypto capability boundary.
//!
//! The migration engine consumes cryptography through [`CryptoProvider`] and
//! never implements primitives itself. [`CapabilityTable`] is the standard
//! provider: it maps each [`AlgorithmType`](crate::algorithm::AlgorithmType)
//! to an [`AlgorithmBackend`] so that algorithm dispatch lives in one place.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               CapabilityTable                │
//! ├──────────────────────────────────────────────┤
//! │  rsa2048 ─────────┐                          │
//! │  ecdsa_p256 ──────┤                          │
//! │  kyber768 ────────┼──► SoftwareBackend / HSM │
//! │  ...              │                          │
//! │  hybrid_kyber768 ─┴──► HybridBackend         │
//! │                         ├─ classical (x25519)│
//! │                         └─ pq (kyber768)     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use keymigrate::algorithm::AlgorithmSpec;
//! use keymigrate::crypto::{CapabilityTable, CryptoProvider, SoftwareBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = CapabilityTable::software(SoftwareBackend::generate().unwrap());
//!     let pair = provider.generate(&AlgorithmSpec::hybrid_kyber768()).await.unwrap();
//!     let sealed = provider
//!         .encrypt(&AlgorithmSpec::hybrid_kyber768(), &pair.private)
//!         .await
//!         .unwrap();
//!     assert!(!sealed.is_empty());
//! }
//! ```

mod error;
mod hybrid;
mod provider;
mod software;
mod table;

pub use error::CryptoError;
pub use hybrid::{HybridBackend, HybridKey};
pub use provider::{CryptoProvider, KeyPair, PublicKey, SecretKeyMaterial};
pub use software::{SoftwareBackend, AES_256_KEY_SIZE, AES_GCM_NONCE_SIZE, AES_GCM_TAG_SIZE};
pub use table::{check_public_key, AlgorithmBackend, CapabilityTable};
