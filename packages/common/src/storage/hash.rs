use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::RepoError;

/// A Git object id as reported by the remote (blob or commit).
///
/// Accepts SHA-1 (40 hex chars) and SHA-256 (64 hex chars) object formats.
/// Stored lowercase.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BlobId(String);

impl BlobId {
    /// Parse a hex-encoded object id.
    pub fn parse(s: &str) -> Result<Self, RepoError> {
        if s.len() != 40 && s.len() != 64 {
            return Err(RepoError::Decode(format!(
                "expected 40 or 64 hex characters in object id, got {}",
                s.len()
            )));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RepoError::Decode(format!("object id is not hex: {s}")));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Git SHA-256 blob id of `data` (`sha256("blob <len>\0" ++ data)`).
    pub fn for_content(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("blob {}\0", data.len()).as_bytes());
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First seven characters, as Git abbreviates ids.
    pub fn short(&self) -> &str {
        &self.0[..7]
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobId({})", self.0)
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for BlobId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BlobId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
