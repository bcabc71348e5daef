//! Cache key generation and normalization.

use std::fmt;

/// Identidad compuesta de una entrada: namespace + key.
///
/// Namespaces keep independently invalidatable groups of keys apart, so the
/// same key under two namespaces never collides. Both parts are used
/// verbatim; upstream paths are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    key: String,
}

impl CacheKey {
    /// Crea una nueva cache key.
    ///
    /// # Examples
    ///
    /// ```
    /// use confera_server::cache::CacheKey;
    ///
    /// let key = CacheKey::new("rooms", "/rooms/standup");
    /// assert_eq!(key.namespace(), "rooms");
    /// assert_eq!(key.key(), "/rooms/standup");
    /// ```
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Retorna el namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Retorna la key dentro del namespace.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.key)
    }
}

/// Builds the canonical key of a read request: the path followed by its
/// query parameters sorted by name, then by value.
///
/// Two requests that differ only in parameter order map to the same key.
///
/// # Examples
///
/// ```
/// use confera_server::cache::request_key;
///
/// let a = request_key("/recordings", &[("limit", "10"), ("ending_before", "abc")]);
/// let b = request_key("/recordings", &[("ending_before", "abc"), ("limit", "10")]);
/// assert_eq!(a, b);
/// assert_eq!(a, "/recordings?ending_before=abc&limit=10");
/// ```
pub fn request_key(path: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }

    let mut sorted = params.to_vec();
    sorted.sort();

    let query = sorted
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", path, query)
}
