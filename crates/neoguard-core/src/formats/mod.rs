//! # Formats
//!
//! On-disk formats owned by the CORE.

pub mod persistence;

#[cfg(feature = "crypto-hash")]
pub use persistence::snapshot_checksum;
pub use persistence::{
    HEADER_SIZE, MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, snapshot_from_bytes,
    snapshot_to_bytes,
};
