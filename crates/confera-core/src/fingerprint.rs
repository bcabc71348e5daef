//! Short one-way fingerprints for values that must not reach the logs.
//!
//! Caller identities are usually API keys or bearer tokens. Logging the
//! fingerprint keeps one caller's lines correlatable without writing the
//! credential itself.

use std::fmt;

use sha2::{Digest, Sha256};

/// Bytes of the digest kept; 8 bytes render as 16 hex chars.
const FINGERPRINT_BYTES: usize = 8;

/// Truncated SHA-256 of a secret-bearing string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints `value`.
    ///
    /// # Example
    ///
    /// ```
    /// use confera_core::Fingerprint;
    ///
    /// let fp = Fingerprint::of("Bearer sk_live_0123456789");
    /// assert_eq!(fp.as_str().len(), 16);
    /// assert!(!fp.as_str().contains("sk_live"));
    /// assert_eq!(fp, Fingerprint::of("Bearer sk_live_0123456789"));
    /// ```
    pub fn of(value: &str) -> Self {
        let digest = Sha256::digest(value.as_bytes());
        Self(hex::encode(&digest[..FINGERPRINT_BYTES]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
