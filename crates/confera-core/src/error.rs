//! Error types for Confera.
//!
//! Only configuration problems are errors here. A denied admission, a cache
//! miss, an expired entry or an eviction are ordinary return values and never
//! show up in this module.
//!
//! # Example
//!
//! ```
//! use confera_core::{ConfigError, Result};
//!
//! fn capacity(max_requests: u32) -> Result<u32> {
//!     if max_requests == 0 {
//!         return Err(ConfigError::invalid_max_requests(max_requests));
//!     }
//!     Ok(max_requests)
//! }
//!
//! assert!(capacity(0).unwrap_err().is_invalid_value());
//! ```

use thiserror::Error;

/// Invalid or unloadable configuration.
///
/// Raised synchronously when a component is constructed, never on first use.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Bucket capacity must be positive.
    #[error("Invalid max_requests {value}: must be greater than zero")]
    InvalidMaxRequests {
        /// The value provided
        value: u64,
    },

    /// Refill window must be positive.
    #[error("Invalid rate limit window {value_ms}ms: must be greater than zero")]
    InvalidWindow {
        /// The window provided, in milliseconds
        value_ms: u128,
    },

    /// Default TTL must be positive.
    #[error("Invalid cache ttl {value_ms}ms: must be greater than zero")]
    InvalidTtl {
        /// The TTL provided, in milliseconds
        value_ms: u128,
    },

    /// A configured size bound must allow at least one entry.
    #[error("Invalid cache max_items 0: omit the bound instead of setting it to zero")]
    InvalidMaxItems,

    /// Generic field validation failure.
    #[error("Validation error for field '{field}': {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Description of the failure
        message: String,
    },

    /// Settings could not be loaded or deserialized.
    #[error("Failed to load configuration: {message}")]
    Load {
        /// Description of what went wrong
        message: String,
        /// Underlying error
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ConfigError {
    /// Creates an InvalidMaxRequests error.
    pub fn invalid_max_requests(value: impl Into<u64>) -> Self {
        Self::InvalidMaxRequests {
            value: value.into(),
        }
    }

    /// Creates an InvalidWindow error.
    pub fn invalid_window(window: std::time::Duration) -> Self {
        Self::InvalidWindow {
            value_ms: window.as_millis(),
        }
    }

    /// Creates an InvalidTtl error.
    pub fn invalid_ttl(ttl: std::time::Duration) -> Self {
        Self::InvalidTtl {
            value_ms: ttl.as_millis(),
        }
    }

    /// Creates a Validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a Load error without a cause.
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a Load error with a cause.
    pub fn load_with_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Load {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Returns true if a numeric setting was out of range.
    pub fn is_invalid_value(&self) -> bool {
        matches!(
            self,
            Self::InvalidMaxRequests { .. }
                | Self::InvalidWindow { .. }
                | Self::InvalidTtl { .. }
                | Self::InvalidMaxItems
        )
    }

    /// Returns true if settings could not be loaded.
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Load { .. })
    }
}

/// A value could not be serialized for tagging.
#[derive(Debug, Error)]
#[error("Failed to serialize value for etag: {0}")]
pub struct EtagError(#[from] pub serde_json::Error);

/// Type alias for Results with ConfigError.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_invalid_max_requests_display() {
        let error = ConfigError::invalid_max_requests(0u32);
        let msg = format!("{}", error);

        assert!(msg.contains("max_requests"));
        assert!(error.is_invalid_value());
    }

    #[test]
    fn test_invalid_window_reports_millis() {
        let error = ConfigError::invalid_window(Duration::ZERO);
        assert!(format!("{}", error).contains("0ms"));
    }

    #[test]
    fn test_invalid_ttl() {
        let error = ConfigError::invalid_ttl(Duration::ZERO);
        assert!(matches!(error, ConfigError::InvalidTtl { value_ms: 0 }));
    }

    #[test]
    fn test_load_error_source_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error = ConfigError::load_with_cause("settings file unreadable", io_error);

        use std::error::Error;
        assert!(error.source().is_some());
        assert!(error.is_load_error());
        assert!(!error.is_invalid_value());
    }

    #[test]
    fn test_validation_error() {
        let error = ConfigError::validation("rate_limit.message", "must not be empty");
        let msg = format!("{}", error);

        assert!(msg.contains("rate_limit.message"));
        assert!(msg.contains("must not be empty"));
    }
}
