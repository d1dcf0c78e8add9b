use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Digest algorithm a container uses to address its blocks.
///
/// The backend decides the algorithm per container; hashfs only needs to
/// recompute it when verifying fetched blocks or hashing blocks it writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    /// Hash `data` and return the lowercase hex digest.
    pub fn digest(&self, data: &[u8]) -> BlockHash {
        match self {
            Self::Sha256 => BlockHash(hex::encode(Sha256::digest(data))),
            Self::Blake3 => BlockHash(blake3::hash(data).to_hex().to_string()),
        }
    }

    /// Length in characters of a hex digest produced by this algorithm.
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 | Self::Blake3 => 64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = TypeError;

    /// Accepts the spellings backends put in container headers
    /// (`sha256`, `SHA-256`, `sha_256`, `blake3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            _ => Err(TypeError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Hex digest identifying one block of an object.
///
/// Hashes arrive from backend metadata as strings and are compared verbatim,
/// so the wrapper keeps the exact text it was built from.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockHash(String);

impl BlockHash {
    /// Wrap a hash string, rejecting empty or non-hex input.
    pub fn parse(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        if s.is_empty() {
            return Err(TypeError::InvalidHash("empty hash".into()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidHash(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw UTF-8 bytes of the hex text (what the wire format carries).
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First 8 characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self.short())
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlockHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
