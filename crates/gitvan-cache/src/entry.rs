//! On-disk entry framing: a small binary header plus an optionally
//! LZ4-compressed payload.
//!
//! Deliberately not JSON: cache payloads here are often compressed
//! RDF/SPARQL-result blobs
//! rather than small structured records, so JSON's base64-then-decode
//! round trip would cost more than it saves.

use crate::error::{CacheError, CacheResult};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

const MAGIC: &[u8; 4] = b"GVC1";
/// Bumping this invalidates every existing on-disk entry the next time
/// it is read, without needing a separate migration step.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const COMPRESSION_MIN_SIZE: usize = 1024;
/// Only keep the compressed form if it actually saves at least this
/// fraction of the original size; otherwise the decompression cost on
/// every read isn't worth it.
const COMPRESSION_MIN_SAVINGS: f64 = 0.20;

#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub schema_version: u32,
    pub created_at_unix: i64,
    pub ttl_secs: Option<u64>,
    pub integrity_hash: [u8; 32],
}

impl EntryMeta {
    pub fn is_expired(&self, now_unix: i64) -> bool {
        match self.ttl_secs {
            Some(ttl) => now_unix.saturating_sub(self.created_at_unix) > ttl as i64,
            None => false,
        }
    }
}

/// Frame `raw` (the decompressed payload) with a header into the bytes
/// written to disk.
pub fn encode(raw: &[u8], schema_version: u32, created_at_unix: i64, ttl_secs: Option<u64>) -> CacheResult<Vec<u8>> {
    let integrity_hash = sha256(raw);
    let (compressed, payload) = maybe_compress(raw)?;

    let mut out = Vec::with_capacity(raw.len() + 64);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&schema_version.to_le_bytes());
    out.extend_from_slice(&created_at_unix.to_le_bytes());
    out.extend_from_slice(&ttl_secs.map(|t| t as i64).unwrap_or(-1).to_le_bytes());
    out.push(compressed as u8);
    out.extend_from_slice(&(raw.len() as u64).to_le_bytes());
    out.extend_from_slice(&integrity_hash);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Parse the header and decompress/verify the payload, returning the
/// original raw bytes plus metadata.
pub fn decode(bytes: &[u8], key_hex: &str) -> CacheResult<(Vec<u8>, EntryMeta)> {
    if bytes.len() < 4 + 4 + 8 + 8 + 1 + 8 + 32 {
        return Err(CacheError::Compression("truncated cache entry header".to_string()));
    }
    let mut cursor = 0usize;
    let magic = &bytes[cursor..cursor + 4];
    cursor += 4;
    if magic != MAGIC {
        return Err(CacheError::Compression("bad cache entry magic".to_string()));
    }
    let schema_version = u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap());
    cursor += 4;
    let created_at_unix = i64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;
    let ttl_raw = i64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;
    let ttl_secs = if ttl_raw < 0 { None } else { Some(ttl_raw as u64) };
    let compressed = bytes[cursor] != 0;
    cursor += 1;
    let raw_len = u64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap()) as usize;
    cursor += 8;
    let mut integrity_hash = [0u8; 32];
    integrity_hash.copy_from_slice(&bytes[cursor..cursor + 32]);
    cursor += 32;
    let payload = &bytes[cursor..];

    let raw = if compressed {
        decompress(payload, raw_len)?
    } else {
        payload.to_vec()
    };

    let actual_hash = sha256(&raw);
    if actual_hash != integrity_hash {
        return Err(CacheError::Integrity {
            key: key_hex.to_string(),
            expected: hex::encode(integrity_hash),
            found: hex::encode(actual_hash),
        });
    }

    Ok((
        raw,
        EntryMeta {
            schema_version,
            created_at_unix,
            ttl_secs,
            integrity_hash,
        },
    ))
}

fn maybe_compress(raw: &[u8]) -> CacheResult<(bool, Vec<u8>)> {
    if raw.len() < COMPRESSION_MIN_SIZE {
        return Ok((false, raw.to_vec()));
    }
    let compressed = compress(raw)?;
    let savings = 1.0 - (compressed.len() as f64 / raw.len() as f64);
    if savings >= COMPRESSION_MIN_SAVINGS {
        Ok((true, compressed))
    } else {
        Ok((false, raw.to_vec()))
    }
}

fn compress(raw: &[u8]) -> CacheResult<Vec<u8>> {
    let mut encoder = lz4::EncoderBuilder::new()
        .build(Vec::new())
        .map_err(|e| CacheError::Compression(e.to_string()))?;
    encoder
        .write_all(raw)
        .map_err(|e| CacheError::Compression(e.to_string()))?;
    let (out, result) = encoder.finish();
    result.map_err(|e| CacheError::Compression(e.to_string()))?;
    Ok(out)
}

fn decompress(payload: &[u8], expected_len: usize) -> CacheResult<Vec<u8>> {
    let mut decoder = lz4::Decoder::new(payload).map_err(|e| CacheError::Compression(e.to_string()))?;
    let mut out = Vec::with_capacity(expected_len);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Compression(e.to_string()))?;
    Ok(out)
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_is_stored_uncompressed() {
        let raw = b"short payload";
        let framed = encode(raw, 1, 1000, None).unwrap();
        let (decoded, meta) = decode(&framed, "k").unwrap();
        assert_eq!(decoded, raw);
        assert_eq!(meta.schema_version, 1);
    }

    #[test]
    fn large_compressible_payload_round_trips() {
        let raw = vec![b'a'; 8192];
        let framed = encode(&raw, 1, 1000, Some(60)).unwrap();
        assert!(framed.len() < raw.len());
        let (decoded, meta) = decode(&framed, "k").unwrap();
        assert_eq!(decoded, raw);
        assert_eq!(meta.ttl_secs, Some(60));
    }

    #[test]
    fn corrupted_payload_fails_integrity_check() {
        let raw = vec![7u8; 4096];
        let mut framed = encode(&raw, 1, 1000, None).unwrap();
        let last = framed.len() - 1;
        framed[last] ^= 0xFF;
        let err = decode(&framed, "k").unwrap_err();
        matches!(err, CacheError::Integrity { .. });
    }

    #[test]
    fn expiry_is_relative_to_created_at() {
        let meta = EntryMeta {
            schema_version: 1,
            created_at_unix: 1000,
            ttl_secs: Some(10),
            integrity_hash: [0u8; 32],
        };
        assert!(!meta.is_expired(1005));
        assert!(meta.is_expired(1011));
    }
}
