//! Cache inspection and invalidation endpoint handlers.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppError;
use crate::metrics::EvictionReason;
use crate::state::AppState;

/// Response para operaciones de invalidacion.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    /// Numero de entries invalidadas.
    pub invalidated: usize,
    /// Mensaje descriptivo.
    pub message: String,
}

/// Estado agregado del cache.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    pub entries: usize,
    pub namespaces: Vec<String>,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Removals by reason (`capacity`, `ttl`, `manual`, `replaced`).
    pub evictions: BTreeMap<String, u64>,
}

#[derive(Debug, Deserialize)]
pub struct NamespacePath {
    pub namespace: String,
}

/// `key` selects one entry, `pattern` a glob over the namespace's keys.
#[derive(Debug, Default, Deserialize)]
pub struct EntryQuery {
    pub key: Option<String>,
    pub pattern: Option<String>,
}

/// GET /cache
#[instrument(skip_all)]
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let cache = state.cache();
    let metrics = cache.metrics();

    Json(CacheStatsResponse {
        entries: cache.len(),
        namespaces: cache.namespaces(),
        hits: metrics.hits(),
        misses: metrics.misses(),
        hit_rate: metrics.hit_rate(),
        evictions: EvictionReason::ALL
            .iter()
            .map(|reason| (reason.as_str().to_string(), metrics.evictions(*reason)))
            .collect(),
    })
}

/// GET /cache/{namespace}?key=...
///
/// Returns the cached value with its `ETag`; answers `304` when
/// `If-None-Match` still matches.
#[instrument(skip_all, fields(namespace = %path.namespace))]
pub async fn get_entry(
    State(state): State<AppState>,
    Path(path): Path<NamespacePath>,
    Query(query): Query<EntryQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let key = query
        .key
        .ok_or_else(|| AppError::bad_request("query parameter 'key' is required"))?;

    let cached = state
        .cache()
        .get(&path.namespace, &key)
        .ok_or_else(|| AppError::NotFound {
            namespace: path.namespace.clone(),
            key: key.clone(),
        })?;

    let Some(etag) = cached.etag else {
        return Ok(Json(cached.value).into_response());
    };

    let etag_header = HeaderValue::from_str(&etag.to_string())
        .map_err(|e| AppError::Internal(format!("invalid etag header: {}", e)))?;

    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| etag.matches_header(v));

    if not_modified {
        tracing::debug!(key = %key, "Entry not modified");
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag_header)]).into_response());
    }

    Ok(([(header::ETAG, etag_header)], Json(cached.value)).into_response())
}

/// DELETE /cache
/// Invalida toda la cache.
#[instrument(skip_all)]
pub async fn invalidate_all(State(state): State<AppState>) -> Response {
    let count = state.cache().clear();

    (
        StatusCode::OK,
        Json(InvalidateResponse {
            invalidated: count,
            message: format!("Invalidated all {} cache entries", count),
        }),
    )
        .into_response()
}

/// DELETE /cache/{namespace}[?key=...|?pattern=...]
#[instrument(skip_all, fields(namespace = %path.namespace))]
pub async fn invalidate_namespace(
    State(state): State<AppState>,
    Path(path): Path<NamespacePath>,
    Query(query): Query<EntryQuery>,
) -> Result<Response, AppError> {
    let cache = state.cache();
    let namespace = &path.namespace;

    let (count, message) = match (query.key, query.pattern) {
        (Some(_), Some(_)) => {
            return Err(AppError::bad_request("use either 'key' or 'pattern', not both"));
        },
        (Some(key), None) => {
            let count = usize::from(cache.invalidate(namespace, &key));
            let message = format!(
                "Invalidated {} cache entry for key '{}' in namespace '{}'",
                count, key, namespace
            );
            (count, message)
        },
        (None, Some(pattern)) => {
            let count = cache.invalidate_matching(namespace, &pattern)?;
            let message = format!(
                "Invalidated {} cache entries matching '{}' in namespace '{}'",
                count, pattern, namespace
            );
            (count, message)
        },
        (None, None) => {
            let count = cache.invalidate_namespace(namespace);
            let message = format!(
                "Invalidated {} cache entries in namespace '{}'",
                count, namespace
            );
            (count, message)
        },
    };

    Ok((
        StatusCode::OK,
        Json(InvalidateResponse {
            invalidated: count,
            message,
        }),
    )
        .into_response())
}
