//! # Persistence Format
//!
//! Binary serialization for neoguard snapshots.
//!
//! File I/O operations are in the app layer; this module only turns a
//! [`Snapshot`] into bytes and back.
//!
//! Format: Header (5 bytes) + postcard-serialized snapshot data.
//! - 4 bytes: Magic ("NEOG")
//! - 1 byte: Version
//!
//! ## Validation
//!
//! Size and header are checked before the payload is decoded:
//! - Maximum payload size limit (`MAX_PERSISTENCE_PAYLOAD_SIZE`)
//! - Header validation before payload parsing
//! - Corrupted payloads surface as `DeserializationError`

use crate::storage::Snapshot;
use crate::{NeoError, primitives};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum allowed size of a serialized snapshot.
///
/// Checked BEFORE decoding so a corrupted length prefix cannot trigger a huge
/// allocation.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Header length in bytes.
pub const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all snapshot data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), NeoError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(NeoError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(NeoError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let [a, b, c, d] = self.magic;
        [a, b, c, d, self.version]
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NeoError> {
        match bytes {
            [a, b, c, d, version, ..] => Ok(Self {
                magic: [*a, *b, *c, *d],
                version: *version,
            }),
            _ => Err(NeoError::DeserializationError(
                "Header too short".to_string(),
            )),
        }
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a snapshot to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn snapshot_to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, NeoError> {
    let header = PersistenceHeader::new();
    let payload =
        postcard::to_stdvec(snapshot).map_err(|e| NeoError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a snapshot from bytes.
///
/// This is a pure transformation - no file I/O. Size and header are
/// validated before the payload is touched.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<Snapshot, NeoError> {
    if bytes.len() < HEADER_SIZE {
        return Err(NeoError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }

    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(NeoError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_SIZE..).unwrap_or_default();
    postcard::from_bytes(payload).map_err(|e| {
        NeoError::DeserializationError(format!("Failed to decode snapshot data: {}", e))
    })
}

/// Compute the BLAKE3 hash of serialized snapshot bytes.
///
/// Returns a 64-character lowercase hex string.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn snapshot_checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
