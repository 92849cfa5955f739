/// Content digests of input files
///
/// Digests are produced by an external hasher and only validated here.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Length of a hex-encoded SHA256 digest
pub const SHA256_HEX_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("not a lowercase SHA256 hex digest: {0:?}")]
pub struct InvalidDigest(pub String);

/// 64 lowercase hex characters identifying one file's content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256HexDigest(String);

impl Sha256HexDigest {
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidDigest> {
        let value = value.into();
        let well_formed = value.len() == SHA256_HEX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

        if well_formed {
            Ok(Self(value))
        } else {
            Err(InvalidDigest(value))
        }
    }

    /// Wrap raw digest bytes as reported by a hasher (`sha2::Sha256::finalize`)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidDigest> {
        Self::parse(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Sha256HexDigest {
    type Error = InvalidDigest;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Sha256HexDigest> for String {
    fn from(value: Sha256HexDigest) -> Self {
        value.0
    }
}
