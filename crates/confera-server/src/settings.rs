//! Server settings.
//!
//! Sources, lowest priority first:
//! 1. `config/default.toml`, embedded at build time
//! 2. the file named by `CONFERA_CONFIG`, if set
//! 3. environment variables prefixed `CONFERA__`, nested with `__`
//!    (`CONFERA__CACHE__DEFAULT_TTL_MS=1000`)
//!
//! Values are only deserialized here. Range checks happen when the cache and
//! the limiter are constructed from them.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use confera_core::ConfigError;
use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::middleware::HeaderIdentity;
use crate::ratelimit::RateLimitConfig;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../config/default.toml");

/// Environment variable naming an extra settings file.
pub const CONFIG_PATH_ENV: &str = "CONFERA_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_ms: u64,
    pub message: String,
    pub annotate_headers: bool,
    pub identity_headers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub default_ttl_ms: u64,
    /// 0 disables the bound.
    pub max_items: usize,
    pub use_etag: bool,
    /// 0 disables the background sweep.
    pub sweep_interval_ms: u64,
}

impl Settings {
    /// Loads defaults, the `CONFERA_CONFIG` file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from(Some(Path::new(&path))),
            Err(_) => Self::load_from(None),
        }
    }

    /// Loads defaults, then `path` if given, then the environment.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_SETTINGS_TOML, FileFormat::Toml));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CONFERA")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("rate_limit.identity_headers"),
        );

        let config = builder
            .build()
            .map_err(|e| ConfigError::load_with_cause("failed to build configuration", e))?;

        config
            .try_deserialize()
            .map_err(|e| ConfigError::load_with_cause("failed to deserialize configuration", e))
    }

    /// Only the embedded defaults, ignoring files and environment.
    pub fn defaults() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(DEFAULT_SETTINGS_TOML, FileFormat::Toml))
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| ConfigError::load_with_cause("invalid embedded defaults", e))
    }
}

impl ServerSettings {
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::validation("server.host", e.to_string())
            })
    }
}

impl RateLimitSettings {
    pub fn limiter_config(&self) -> Result<RateLimitConfig, ConfigError> {
        if self.message.trim().is_empty() {
            return Err(ConfigError::validation(
                "rate_limit.message",
                "must not be empty",
            ));
        }

        Ok(RateLimitConfig {
            max_requests: self.max_requests,
            window: Duration::from_millis(self.window_ms),
            message: self.message.clone(),
        })
    }

    pub fn extractor(&self) -> Result<HeaderIdentity, ConfigError> {
        HeaderIdentity::from_names(&self.identity_headers)
    }
}

impl CacheSettings {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            default_ttl: Duration::from_millis(self.default_ttl_ms),
            max_items: (self.max_items > 0).then_some(self.max_items),
            use_etag: self.use_etag,
            sweep_interval: (self.sweep_interval_ms > 0)
                .then(|| Duration::from_millis(self.sweep_interval_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_defaults() {
        let settings = Settings::defaults().unwrap();

        assert_eq!(settings.server.port, 8890);
        assert!(settings.rate_limit.enabled);
        assert_eq!(settings.rate_limit.max_requests, 100);
        assert_eq!(settings.rate_limit.window_ms, 60_000);
        assert_eq!(settings.cache.max_items, 10_000);
        assert!(settings.cache.use_etag);
    }

    #[test]
    fn test_defaults_convert_to_valid_components() {
        let settings = Settings::defaults().unwrap();

        let limiter = settings.rate_limit.limiter_config().unwrap();
        assert_eq!(limiter.window, Duration::from_secs(60));
        assert!(crate::ratelimit::RateLimiter::new(limiter).is_ok());

        let cache = settings.cache.cache_config();
        assert_eq!(cache.max_items, Some(10_000));
        assert_eq!(cache.sweep_interval, Some(Duration::from_secs(60)));

        assert!(settings.rate_limit.extractor().is_ok());
        assert!(settings.server.addr().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[rate_limit]
max_requests = 5
window_ms = 1000

[cache]
max_items = 0
sweep_interval_ms = 0
"#
        )
        .unwrap();

        let settings = Settings::load_from(Some(file.path())).unwrap();

        assert_eq!(settings.rate_limit.max_requests, 5);
        assert_eq!(settings.rate_limit.window_ms, 1000);
        // Sin tocar
        assert_eq!(settings.server.port, 8890);

        let cache = settings.cache.cache_config();
        assert_eq!(cache.max_items, None);
        assert_eq!(cache.sweep_interval, None);
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let result = Settings::load_from(Some(Path::new("/nonexistent/confera.toml")));
        assert!(result.unwrap_err().is_load_error());
    }

    #[test]
    fn test_zero_capacity_in_file_fails_at_construction() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[rate_limit]\nmax_requests = 0").unwrap();

        let settings = Settings::load_from(Some(file.path())).unwrap();
        let config = settings.rate_limit.limiter_config().unwrap();

        assert!(crate::ratelimit::RateLimiter::new(config).is_err());
    }

    #[test]
    fn test_empty_message_rejected() {
        let mut settings = Settings::defaults().unwrap();
        settings.rate_limit.message = "  ".to_string();

        assert!(settings.rate_limit.limiter_config().is_err());
    }

    #[test]
    fn test_bad_host_rejected() {
        let mut settings = Settings::defaults().unwrap();
        settings.server.host = "not a host".to_string();

        assert!(settings.server.addr().is_err());
    }
}
