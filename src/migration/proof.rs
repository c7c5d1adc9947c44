// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Signed proof-of-rotation.
//!
//! The proof binds a run's job id, source and target specs, policy, final
//! status, and counts under an Ed25519 signature. The signed message is the
//! canonical JSON encoding of every field except the signature itself.

use ring::rand::SystemRandom;
use ring::signature::{self, Ed25519KeyPair, KeyPair as _, UnparsedPublicKey};
use serde::{Deserialize, Serialize};

use crate::algorithm::AlgorithmSpec;

use super::error::ProofError;
use super::job::MetricsSnapshot;
use super::orchestrator::MigrationStatus;

/// Attestation of a completed migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfRotation {
    pub job_id: String,
    pub source_spec: AlgorithmSpec,
    pub target_spec: AlgorithmSpec,
    pub policy: String,
    pub status: MigrationStatus,
    /// True if the target and the resulting inventory passed compliance.
    pub policy_validated: bool,
    pub counts: MetricsSnapshot,
    pub started_at_ms: u64,
    pub issued_at_ms: u64,
    /// Hex-encoded Ed25519 public key of the signer.
    pub signer_public_key: String,
    /// Hex-encoded Ed25519 signature.
    pub signature: String,
}

/// The signed portion of a proof.
#[derive(Debug, Clone, Serialize)]
pub struct ProofClaims {
    pub job_id: String,
    pub source_spec: AlgorithmSpec,
    pub target_spec: AlgorithmSpec,
    pub policy: String,
    pub status: MigrationStatus,
    pub policy_validated: bool,
    pub counts: MetricsSnapshot,
    pub started_at_ms: u64,
    pub issued_at_ms: u64,
}

#[derive(Serialize)]
struct SignedMessage<'a> {
    job_id: &'a str,
    source_spec: &'a AlgorithmSpec,
    target_spec: &'a AlgorithmSpec,
    policy: &'a str,
    status: MigrationStatus,
    policy_validated: bool,
    counts: &'a MetricsSnapshot,
    started_at_ms: u64,
    issued_at_ms: u64,
    signer_public_key: &'a str,
}

impl ProofOfRotation {
    fn message(&self) -> Result<Vec<u8>, ProofError> {
        let message = SignedMessage {
            job_id: &self.job_id,
            source_spec: &self.source_spec,
            target_spec: &self.target_spec,
            policy: &self.policy,
            status: self.status,
            policy_validated: self.policy_validated,
            counts: &self.counts,
            started_at_ms: self.started_at_ms,
            issued_at_ms: self.issued_at_ms,
            signer_public_key: &self.signer_public_key,
        };
        Ok(serde_json::to_vec(&message)?)
    }

    /// Checks the signature against the embedded public key.
    pub fn verify(&self) -> Result<(), ProofError> {
        let public_key = hex::decode(&self.signer_public_key)?;
        self.verify_with(&public_key)
    }

    /// Checks the signature against a trusted public key.
    pub fn verify_with(&self, public_key: &[u8]) -> Result<(), ProofError> {
        let signature = hex::decode(&self.signature)?;
        let message = self.message()?;
        UnparsedPublicKey::new(&signature::ED25519, public_key)
            .verify(&message, &signature)
            .map_err(|_| ProofError::BadSignature)
    }

    pub fn to_json(&self) -> Result<String, ProofError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ProofError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Signs proofs with an Ed25519 key.
pub struct ProofSigner {
    key_pair: Ed25519KeyPair,
}

impl ProofSigner {
    /// Creates a signer with a fresh random key.
    pub fn generate() -> Result<Self, ProofError> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| ProofError::InvalidSigningKey("key generation failed".to_string()))?;
        Self::from_pkcs8(pkcs8.as_ref())
    }

    /// Loads a signer from a PKCS#8 v2 document.
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self, ProofError> {
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8)
            .map_err(|e| ProofError::InvalidSigningKey(e.to_string()))?;
        Ok(Self { key_pair })
    }

    pub fn public_key(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }

    /// Signs `claims`.
    pub fn sign(&self, claims: ProofClaims) -> Result<ProofOfRotation, ProofError> {
        let mut proof = ProofOfRotation {
            job_id: claims.job_id,
            source_spec: claims.source_spec,
            target_spec: claims.target_spec,
            policy: claims.policy,
            status: claims.status,
            policy_validated: claims.policy_validated,
            counts: claims.counts,
            started_at_ms: claims.started_at_ms,
            issued_at_ms: claims.issued_at_ms,
            signer_public_key: hex::encode(self.public_key()),
            signature: String::new(),
        };
        let message = proof.message()?;
        proof.signature = hex::encode(self.key_pair.sign(&message).as_ref());
        Ok(proof)
    }
}

impl std::fmt::Debug for ProofSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofSigner")
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> ProofClaims {
        ProofClaims {
            job_id: "job-1".to_string(),
            source_spec: AlgorithmSpec::rsa2048(),
            target_spec: AlgorithmSpec::hybrid_kyber768(),
            policy: "nist-sp800-208".to_string(),
            status: MigrationStatus::Success,
            policy_validated: true,
            counts: MetricsSnapshot {
                total: 10,
                processed: 10,
                security_checks: 10,
                ..Default::default()
            },
            started_at_ms: 1_700_000_000_000,
            issued_at_ms: 1_700_000_001_000,
        }
    }

    #[test]
    fn test_signed_proof_verifies() {
        let signer = ProofSigner::generate().unwrap();
        let proof = signer.sign(claims()).unwrap();
        proof.verify().unwrap();
        proof.verify_with(signer.public_key()).unwrap();
    }

    #[test]
    fn test_tampered_counts_fail() {
        let signer = ProofSigner::generate().unwrap();
        let mut proof = signer.sign(claims()).unwrap();
        proof.counts.processed = 9;
        assert!(matches!(proof.verify(), Err(ProofError::BadSignature)));
    }

    #[test]
    fn test_foreign_signer_rejected() {
        let signer = ProofSigner::generate().unwrap();
        let other = ProofSigner::generate().unwrap();
        let proof = signer.sign(claims()).unwrap();
        assert!(proof.verify_with(other.public_key()).is_err());
    }

    #[test]
    fn test_json_roundtrip_keeps_signature_valid() {
        let proof = ProofSigner::generate().unwrap().sign(claims()).unwrap();
        let parsed = ProofOfRotation::from_json(&proof.to_json().unwrap()).unwrap();
        assert_eq!(parsed, proof);
        parsed.verify().unwrap();
    }

    #[test]
    fn test_bad_hex_is_encoding_error() {
        let mut proof = ProofSigner::generate().unwrap().sign(claims()).unwrap();
        proof.signature = "zz".to_string();
        assert!(matches!(proof.verify(), Err(ProofError::Encoding(_))));
    }
}
