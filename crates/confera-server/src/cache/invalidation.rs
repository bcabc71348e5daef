//! Cache invalidation: single pair, namespace, glob pattern, everything.

use glob::Pattern;
use tracing::{debug, info};

use crate::cache::{CacheError, CacheKey, ResponseCache};
use crate::metrics::EvictionReason;

impl<V> ResponseCache<V> {
    /// Invalida una entrada especifica. No-op si no existe.
    ///
    /// # Examples
    ///
    /// ```
    /// # use confera_server::cache::{CacheConfig, ResponseCache};
    /// # use serde_json::json;
    /// # let cache = ResponseCache::new(CacheConfig::default()).unwrap();
    /// cache.set("rooms", "/rooms/standup", json!({}));
    /// assert!(cache.invalidate("rooms", "/rooms/standup"));
    /// assert!(!cache.invalidate("rooms", "/rooms/standup"));
    /// ```
    pub fn invalidate(&self, namespace: &str, key: &str) -> bool {
        let key = CacheKey::new(namespace, key);
        let removed = self.remove_key(&key);

        if removed {
            debug!(key = %key, "Cache entry invalidated");
        }
        removed
    }

    /// Invalida todas las entradas de un namespace, y solo esas.
    ///
    /// This is what the request layer calls after any write against an API
    /// surface: the whole namespace goes instead of tracking which reads a
    /// write affects.
    ///
    /// # Examples
    ///
    /// ```
    /// # use confera_server::cache::{CacheConfig, ResponseCache};
    /// # use serde_json::json;
    /// # let cache = ResponseCache::new(CacheConfig::default()).unwrap();
    /// cache.set("rooms", "/rooms", json!([]));
    /// cache.set("rooms", "/rooms/standup", json!({}));
    /// cache.set("recordings", "/recordings", json!([]));
    ///
    /// assert_eq!(cache.invalidate_namespace("rooms"), 2);
    /// assert!(cache.get("recordings", "/recordings").is_some());
    /// ```
    pub fn invalidate_namespace(&self, namespace: &str) -> usize {
        let count = self.remove_where(
            |key, _| key.namespace() == namespace,
            EvictionReason::Explicit,
        );

        info!(namespace = %namespace, count = count, "Cache namespace invalidated");
        count
    }

    /// Invalida las keys de un namespace que coincidan con un patron glob.
    ///
    /// - `*`: coincide con cualquier secuencia de caracteres
    /// - `?`: coincide con un caracter
    ///
    /// # Examples
    ///
    /// ```
    /// # use confera_server::cache::{CacheConfig, ResponseCache};
    /// # use serde_json::json;
    /// # let cache = ResponseCache::new(CacheConfig::default()).unwrap();
    /// cache.set("recordings", "/recordings/a1", json!({}));
    /// cache.set("recordings", "/recordings/a1/access-link", json!({}));
    /// cache.set("recordings", "/recordings/b2", json!({}));
    ///
    /// // Todo lo que cuelga de la grabacion a1
    /// let count = cache.invalidate_matching("recordings", "/recordings/a1*").unwrap();
    /// assert_eq!(count, 2);
    /// ```
    pub fn invalidate_matching(&self, namespace: &str, pattern: &str) -> Result<usize, CacheError> {
        let compiled = Pattern::new(pattern).map_err(|e| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let count = self.remove_where(
            |key, _| key.namespace() == namespace && compiled.matches(key.key()),
            EvictionReason::Explicit,
        );

        info!(
            namespace = %namespace,
            pattern = %pattern,
            count = count,
            "Cache entries invalidated by pattern"
        );
        Ok(count)
    }

    /// Invalida todas las entradas de todos los namespaces.
    pub fn clear(&self) -> usize {
        let count = self.remove_all();
        info!(count = count, "All cache entries invalidated");
        count
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::{CacheConfig, ResponseCache};
    use serde_json::{Value, json};

    fn populated() -> ResponseCache<Value> {
        let cache = ResponseCache::new(CacheConfig::default()).unwrap();

        for ns in ["rooms", "recordings"] {
            for key in ["/list", "/a", "/b"] {
                cache.set(ns, key, json!({"ns": ns, "key": key}));
                // Verificar que se inserto correctamente
                assert!(cache.get(ns, key).is_some());
            }
        }
        cache
    }

    #[test]
    fn test_invalidate_single_key() {
        let cache = populated();

        assert!(cache.invalidate("rooms", "/a"));

        assert!(cache.get("rooms", "/a").is_none());
        assert!(cache.get("rooms", "/b").is_some());
        assert!(cache.get("recordings", "/a").is_some());
    }

    #[test]
    fn test_invalidate_missing_key_is_noop() {
        let cache = populated();

        assert!(!cache.invalidate("rooms", "/nope"));
        assert!(!cache.invalidate("polls", "/a"));
        assert_eq!(cache.len(), 6);
    }

    #[test]
    fn test_invalidate_namespace() {
        let cache = populated();

        let count = cache.invalidate_namespace("rooms");

        assert_eq!(count, 3);
        for key in ["/list", "/a", "/b"] {
            assert!(cache.get("rooms", key).is_none());
            assert!(cache.get("recordings", key).is_some());
        }
    }

    #[test]
    fn test_invalidate_unknown_namespace() {
        let cache = populated();
        assert_eq!(cache.invalidate_namespace("webhooks"), 0);
        assert_eq!(cache.len(), 6);
    }

    #[test]
    fn test_invalidate_matching() {
        let cache = populated();

        let count = cache.invalidate_matching("rooms", "/?").unwrap();

        assert_eq!(count, 2);
        assert!(cache.get("rooms", "/list").is_some());
        assert!(cache.get("recordings", "/a").is_some());
    }

    #[test]
    fn test_invalidate_matching_rejects_bad_pattern() {
        let cache = populated();

        let result = cache.invalidate_matching("rooms", "[unclosed");

        assert!(result.is_err());
        assert_eq!(cache.len(), 6);
    }

    #[test]
    fn test_clear() {
        let cache = populated();

        assert_eq!(cache.clear(), 6);
        assert!(cache.is_empty());
        assert!(cache.namespaces().is_empty());
    }

    #[test]
    fn test_set_after_invalidate_starts_fresh() {
        let cache = populated();
        cache.invalidate("rooms", "/a");

        cache.set("rooms", "/a", json!("fresh"));

        assert_eq!(cache.get("rooms", "/a").unwrap().value, json!("fresh"));
    }
}
