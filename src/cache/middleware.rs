//! Response cache middleware.
//!
//! Caches successful GET responses of the public pages and serves them until
//! a post change evicts them or the reference day rolls over.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use time::UtcOffset;
use tracing::{debug, instrument, warn};

use crate::application::repos::Clock;
use crate::domain::visibility::reference_day;

use super::keys::{PageKey, ResponseKey};
use super::store::{CachedResponse, ResponseStore};

const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct CacheState {
    pub store: ResponseStore,
    pub clock: Arc<dyn Clock>,
    pub offset: UtcOffset,
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let Some(page) = PageKey::from_path(request.uri().path()) else {
        return next.run(request).await;
    };

    let key = ResponseKey {
        page,
        day: reference_day(cache.clock.now(), cache.offset),
    };

    if let Some(cached) = cache.store.get(&key).await {
        debug!(cache = "response", outcome = "hit", "serving cached response");
        return cached;
    }

    debug!(cache = "response", outcome = "miss", "cache miss, executing handler");
    let rendered_at = cache.store.epoch().await;
    let response = next.run(request).await;

    if response.status() != StatusCode::OK {
        return response;
    }

    // Bodies above the cap are passed through untouched and never cached.
    if response
        .body()
        .size_hint()
        .upper()
        .is_none_or(|upper| upper > MAX_CACHED_BODY_BYTES as u64)
    {
        debug!(cache = "response", "response size unknown or above the cache cap");
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(cache = "response", error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if bytes.len() <= MAX_CACHED_BODY_BYTES {
        cache
            .store
            .put(
                key,
                CachedResponse::new(parts.status, &parts.headers, bytes.clone()),
                rendered_at,
            )
            .await;
    }

    Response::from_parts(parts, Body::from(bytes))
}
