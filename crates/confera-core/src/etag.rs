//! Deterministic content tags.
//!
//! A tag is computed over a canonical JSON rendering of the value: object keys
//! sorted at every depth, no whitespace. Two structurally equal values always
//! get the same tag no matter how their maps were built.
//!
//! Tags detect change between two observations. They are not an integrity
//! check.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::EtagError;

/// Bytes of the digest kept in the tag.
const TAG_BYTES: usize = 16;

/// Content tag for a cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag(String);

impl ETag {
    /// Computes the tag of any serializable value.
    ///
    /// # Example
    ///
    /// ```
    /// use confera_core::ETag;
    /// use serde_json::json;
    ///
    /// let a = ETag::of(&json!({"a": 1, "b": [1, 2]})).unwrap();
    /// let b = ETag::of(&json!({"b": [1, 2], "a": 1})).unwrap();
    /// assert_eq!(a, b);
    /// ```
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self, EtagError> {
        let value = serde_json::to_value(value)?;
        Ok(Self::of_json(&value))
    }

    /// Computes the tag of a JSON value.
    pub fn of_json(value: &Value) -> Self {
        let digest = Sha256::digest(canonical_json(value).as_bytes());
        Self(hex::encode(&digest[..TAG_BYTES]))
    }

    /// The bare hex digest, without quotes.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks an `If-None-Match` header value against this tag.
    ///
    /// Accepts `*`, comma separated lists and weak (`W/`) validators.
    pub fn matches_header(&self, header: &str) -> bool {
        header.split(',').map(str::trim).any(|candidate| {
            if candidate == "*" {
                return true;
            }
            let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
            candidate.trim_matches('"') == self.0
        })
    }
}

/// Renders as the HTTP strong validator form, `"<hex>"`.
impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

/// Canonical JSON rendering with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (key, child)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Strings always serialize
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(child, out);
            }
            out.push('}');
        },
        Value::Array(items) => {
            out.push('[');
            for (i, child) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(child, out);
            }
            out.push(']');
        },
        scalar => out.push_str(&scalar.to_string()),
    }
}
