//! Content fingerprinting and wire encoding of module bytes.
//!
//! Nodes identify stored modules by a hex digest of their content and carry
//! content inside text commands as base64. Both sides must agree on the
//! digest algorithm; [`HashAlgorithm::Sha1`] is what cluster nodes compute.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{Result, UdfError};

/// Digest algorithm used to fingerprint module content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-1, 40 hex digits.
    #[default]
    Sha1,
    /// SHA-256, 64 hex digits.
    Sha256,
}

impl HashAlgorithm {
    /// Computes the lower-case hex fingerprint of `content`.
    pub fn fingerprint(&self, content: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha1 => hex::encode(sha1::Sha1::digest(content)),
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(content)),
        }
    }

    /// Returns the number of hex digits in a fingerprint.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha1 => f.write_str("sha1"),
            HashAlgorithm::Sha256 => f.write_str("sha256"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = UdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(UdfError::Configuration(format!(
                "unknown hash algorithm '{}' (expected sha1 or sha256)",
                other
            ))),
        }
    }
}

/// Computes the fingerprint of `content` with the default algorithm.
pub fn fingerprint(content: &[u8]) -> String {
    HashAlgorithm::default().fingerprint(content)
}

/// Compares two hex fingerprints, ignoring case.
pub fn hashes_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Encodes bytes for transport inside an info command.
pub fn encode_for_wire(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes bytes previously produced by [`encode_for_wire`].
///
/// # Errors
///
/// Returns `UdfError::Transport` if the text is not valid base64, since it
/// can only come from a malformed response.
pub fn decode_from_wire(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| UdfError::Transport(format!("invalid base64 content: {}", e)))
}
