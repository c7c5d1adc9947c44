// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Algorithm descriptors.
//!
//! An [`AlgorithmSpec`] names the algorithm a key record is protected under,
//! together with its parameters and security classification. Dispatch on the
//! algorithm is always done through the [`AlgorithmType`] tag; components never
//! branch on raw strings.
//!
//! # Families
//!
//! ```text
//!   classical                 post-quantum            hybrid
//!   ─────────                 ────────────            ──────
//!   Rsa2048                   Kyber768                HybridKyber768   = X25519    + Kyber768
//!   EcdsaP256                 Dilithium3              HybridDilithium3 = EcdsaP256 + Dilithium3
//!   X25519
//!   Aes256Gcm (symmetric)
//!   ChaCha20Poly1305 (symmetric)
//! ```

mod kind;
mod spec;

pub use kind::{AlgorithmFamily, AlgorithmType};
pub use spec::AlgorithmSpec;
