//! Core types for the versioned key-value engine.

use crate::error::ApiError;

/// Hash: Generic 256-bit BLAKE3 digest
pub type Hash = [u8; 32];

/// NodeID: Content hash of a snapshot node (file or directory)
pub type NodeID = Hash;

/// CommitID: Content hash of a commit body
pub type CommitID = Hash;

/// Render a hash as 64 lowercase hex characters.
pub fn to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parse a full 64-character hex string into a hash.
pub fn parse_hash(s: &str) -> Result<Hash, ApiError> {
    let bytes = hex::decode(s).map_err(|e| ApiError::InvalidHash(format!("{}: {}", s, e)))?;
    bytes
        .try_into()
        .map_err(|_| ApiError::InvalidHash(format!("{}: expected 32 bytes", s)))
}

/// Returns true when `s` looks like a full commit hash.
pub fn is_full_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Serde adapter rendering a `Hash` as a hex string at the boundary.
pub mod hex_hash {
    use super::Hash;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hash(&s).map_err(D::Error::custom)
    }
}

/// Serde adapter for sequences of hashes.
pub mod hex_hashes {
    use super::Hash;
    use serde::{de::Error, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hashes: &[Hash], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(hashes.len()))?;
        for hash in hashes {
            seq.serialize_element(&hex::encode(hash))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Hash>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| super::parse_hash(s).map_err(D::Error::custom))
            .collect()
    }
}
