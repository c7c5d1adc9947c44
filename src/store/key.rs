// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! RocksDB key encoding for key records.
//!
//! Three keyspaces share one column family:
//!
//! - Rows:     `[b'r'][id bytes]`
//! - Index:    `[b'i'][algorithm tag:u8][id bytes]`
//! - Archives: `[b'a'][id_len:u32 BE][original id][archive id]`
//!
//! The index holds one empty-valued entry per non-archived record so a scan by
//! algorithm is a prefix iteration in id order. Archive references let every
//! snapshot of a record be found without a full scan.

use crate::algorithm::AlgorithmType;

use super::{RecordId, StoreError};

const ROW_TAG: u8 = b'r';
const INDEX_TAG: u8 = b'i';
const ARCHIVE_TAG: u8 = b'a';

/// Returns the stable one-byte tag for an algorithm.
#[inline]
fn algorithm_tag(algorithm: AlgorithmType) -> u8 {
    AlgorithmType::ALL
        .iter()
        .position(|a| *a == algorithm)
        .unwrap_or(u8::MAX as usize) as u8
}

/// Encodes the row key for a record id.
#[inline]
pub fn encode_record_key(id: &RecordId) -> Vec<u8> {
    let id_bytes = id.as_str().as_bytes();
    let mut encoded = Vec::with_capacity(1 + id_bytes.len());
    encoded.push(ROW_TAG);
    encoded.extend_from_slice(id_bytes);
    encoded
}

/// Returns the prefix under which all index entries for `algorithm` live.
#[inline]
pub fn index_prefix(algorithm: AlgorithmType) -> Vec<u8> {
    vec![INDEX_TAG, algorithm_tag(algorithm)]
}

/// Encodes the index key for a record on `algorithm`.
#[inline]
pub fn encode_index_key(algorithm: AlgorithmType, id: &RecordId) -> Vec<u8> {
    let mut encoded = index_prefix(algorithm);
    encoded.extend_from_slice(id.as_str().as_bytes());
    encoded
}

/// Returns the prefix under which all archive references for `id` live.
#[inline]
pub fn archive_ref_prefix(id: &RecordId) -> Vec<u8> {
    let id_bytes = id.as_str().as_bytes();
    let mut prefix = Vec::with_capacity(5 + id_bytes.len());
    prefix.push(ARCHIVE_TAG);
    prefix.extend_from_slice(&(id_bytes.len() as u32).to_be_bytes());
    prefix.extend_from_slice(id_bytes);
    prefix
}

/// Encodes the reference from an original record to one of its archived rows.
#[inline]
pub fn encode_archive_ref_key(original: &RecordId, archive_id: &RecordId) -> Vec<u8> {
    let mut encoded = archive_ref_prefix(original);
    encoded.extend_from_slice(archive_id.as_str().as_bytes());
    encoded
}

/// Extracts the archived row id from an archive reference key.
pub fn decode_archive_ref_key(encoded: &[u8]) -> Result<RecordId, StoreError> {
    if encoded.len() < 5 || encoded[0] != ARCHIVE_TAG {
        return Err(StoreError::InvalidKeyEncoding(
            "not an archive reference key".to_string(),
        ));
    }

    let id_len = u32::from_be_bytes([encoded[1], encoded[2], encoded[3], encoded[4]]) as usize;
    let start = 5 + id_len;
    if encoded.len() < start {
        return Err(StoreError::InvalidKeyEncoding(format!(
            "expected at least {} bytes, got {}",
            start,
            encoded.len()
        )));
    }

    let archive_id = std::str::from_utf8(&encoded[start..])
        .map_err(|e| StoreError::InvalidKeyEncoding(format!("archive id is not utf-8: {}", e)))?;

    Ok(RecordId::new(archive_id))
}

/// Decodes an index key back into its record id.
pub fn decode_index_key(encoded: &[u8]) -> Result<(AlgorithmType, RecordId), StoreError> {
    if encoded.len() < 2 || encoded[0] != INDEX_TAG {
        return Err(StoreError::InvalidKeyEncoding(
            "not an index key".to_string(),
        ));
    }

    let algorithm = AlgorithmType::ALL
        .get(encoded[1] as usize)
        .copied()
        .ok_or_else(|| {
            StoreError::InvalidKeyEncoding(format!("unknown algorithm tag {}", encoded[1]))
        })?;

    let id = std::str::from_utf8(&encoded[2..])
        .map_err(|e| StoreError::InvalidKeyEncoding(format!("record id is not utf-8: {}", e)))?;

    Ok((algorithm, RecordId::new(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_key_layout() {
        let key = encode_record_key(&RecordId::new("abc"));
        assert_eq!(key, b"rabc".to_vec());
    }

    #[test]
    fn test_index_keys_group_by_algorithm() {
        let rsa = encode_index_key(AlgorithmType::Rsa2048, &RecordId::new("k1"));
        let hyb = encode_index_key(AlgorithmType::HybridKyber768, &RecordId::new("k1"));

        assert!(rsa.starts_with(&index_prefix(AlgorithmType::Rsa2048)));
        assert!(!hyb.starts_with(&index_prefix(AlgorithmType::Rsa2048)));
    }

    #[test]
    fn test_archive_refs_do_not_collide_across_ids() {
        // "k1" + "0abc" must not look like a reference for "k10".
        let key = encode_archive_ref_key(&RecordId::new("k1"), &RecordId::new("0abc"));
        assert!(key.starts_with(&archive_ref_prefix(&RecordId::new("k1"))));
        assert!(!key.starts_with(&archive_ref_prefix(&RecordId::new("k10"))));
        assert_eq!(decode_archive_ref_key(&key).unwrap(), RecordId::new("0abc"));
    }

    #[test]
    fn test_decode_rejects_row_keys() {
        let row = encode_record_key(&RecordId::new("k1"));
        assert!(decode_index_key(&row).is_err());
        assert!(decode_index_key(&[INDEX_TAG]).is_err());
        assert!(decode_index_key(&[INDEX_TAG, 200, b'x']).is_err());
    }
}
