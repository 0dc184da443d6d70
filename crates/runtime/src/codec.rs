//! Cache codec for runtime compositions
//!
//! # Binary Format
//!
//! ```text
//! magic("MOSC", 4) + version(u32 LE) + payload_len(u64 LE)
//! + payload(MessagePack, payload_len bytes) + crc32(u32 LE)
//! ```
//!
//! The CRC covers everything before it. Decoding re-validates the
//! composition, so a cache written by a buggy producer is rejected the same
//! way a hand-built invalid composition is.

use crate::composition::RuntimeComposition;
use crate::error::InvalidComposition;

/// Magic bytes opening every cache blob
pub const CACHE_MAGIC: &[u8; 4] = b"MOSC";

/// Current cache format version
pub const CACHE_FORMAT_VERSION: u32 = 1;

const HEADER_SIZE: usize = 4 + 4 + 8;
const TRAILER_SIZE: usize = 4;

/// Cache encoding and decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The blob does not start with [`CACHE_MAGIC`]
    #[error("Not a composition cache (bad magic)")]
    BadMagic,

    /// Written by an incompatible format version
    #[error("Unsupported cache format version {0}")]
    UnsupportedVersion(u32),

    /// Fewer bytes than the header announces
    #[error("Truncated cache: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required
        expected: usize,
        /// Bytes present
        actual: usize,
    },

    /// The checksum does not match the contents
    #[error("Cache checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// CRC stored in the trailer
        stored: u32,
        /// CRC computed over the contents
        computed: u32,
    },

    /// Serialization failed
    #[error("Cache encode error: {0}")]
    Encode(String),

    /// The payload is not a valid composition document
    #[error("Cache decode error: {0}")]
    Decode(String),

    /// The payload decoded but violates composition invariants
    #[error("Cached composition is invalid: {0}")]
    Invalid(#[from] InvalidComposition),
}

/// Serialize a composition into cache bytes
pub fn encode(composition: &RuntimeComposition) -> Result<Vec<u8>, CacheError> {
    let payload =
        rmp_serde::to_vec_named(composition).map_err(|e| CacheError::Encode(e.to_string()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + TRAILER_SIZE);
    buf.extend_from_slice(CACHE_MAGIC);
    buf.extend_from_slice(&CACHE_FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(&payload);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    tracing::debug!(
        target: "mosaic::cache",
        parts = composition.parts().len(),
        bytes = buf.len(),
        "Encoded runtime composition"
    );
    Ok(buf)
}

/// Deserialize and validate a composition from cache bytes
pub fn decode(bytes: &[u8]) -> Result<RuntimeComposition, CacheError> {
    if bytes.len() < HEADER_SIZE + TRAILER_SIZE {
        return Err(CacheError::Truncated {
            expected: HEADER_SIZE + TRAILER_SIZE,
            actual: bytes.len(),
        });
    }
    if &bytes[0..4] != CACHE_MAGIC {
        return Err(CacheError::BadMagic);
    }

    let version = u32::from_le_bytes(read_array(&bytes[4..8]));
    if version != CACHE_FORMAT_VERSION {
        return Err(CacheError::UnsupportedVersion(version));
    }

    let payload_len = u64::from_le_bytes(read_array(&bytes[8..16])) as usize;
    let expected = HEADER_SIZE
        .saturating_add(payload_len)
        .saturating_add(TRAILER_SIZE);
    if bytes.len() != expected {
        return Err(CacheError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let body_end = HEADER_SIZE + payload_len;
    let stored = u32::from_le_bytes(read_array(&bytes[body_end..]));
    let computed = crc32fast::hash(&bytes[..body_end]);
    if stored != computed {
        return Err(CacheError::ChecksumMismatch { stored, computed });
    }

    let composition: RuntimeComposition = rmp_serde::from_slice(&bytes[HEADER_SIZE..body_end])
        .map_err(|e| CacheError::Decode(e.to_string()))?;
    composition.validate()?;

    tracing::debug!(
        target: "mosaic::cache",
        parts = composition.parts().len(),
        "Decoded runtime composition"
    );
    Ok(composition)
}

fn read_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&slice[..N]);
    out
}
