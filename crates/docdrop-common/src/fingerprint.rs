//! Content fingerprints
//!
//! A fingerprint is the SHA-256 digest of a file's full byte content. It is
//! the deduplication key for the processed ledger, so two files with the same
//! bytes always map to the same fingerprint regardless of path or name.

use crate::error::{DocdropError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

/// Size of the read buffer used when hashing streams
const CHUNK_SIZE: usize = 8192;

/// Length of a fingerprint in bytes
pub const FINGERPRINT_LEN: usize = 32;

/// Fixed-length content hash of a file
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprint the full content of a file, reading it in fixed-size chunks
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(&mut file)
    }

    /// Fingerprint any readable source
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; CHUNK_SIZE];

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Self(hasher.finalize().into()))
    }

    /// Fingerprint an in-memory buffer
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Parse a lowercase or uppercase hex encoding
    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value)
            .map_err(|e| DocdropError::invalid_fingerprint(value, e.to_string()))?;

        let bytes: [u8; FINGERPRINT_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            DocdropError::invalid_fingerprint(
                value,
                format!("expected {} bytes, got {}", FINGERPRINT_LEN, b.len()),
            )
        })?;

        Ok(Self(bytes))
    }

    /// Lowercase hex encoding, as stored in the ledger
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = DocdropError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_hex(&value).map_err(serde::de::Error::custom)
    }
}
