//! In-process response cache for the public read routes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use metrics::counter;
use tokio::sync::RwLock;
use tracing::debug;

use crate::application::repos::{InvalidationError, RenderInvalidator};

use super::keys::{PageKey, ResponseKey};

const SOURCE: &str = "cache::store";

/// Rendered responses keyed by page and reference day.
///
/// Every eviction bumps an epoch. A response rendered before an eviction
/// may reflect the pre-mutation snapshot, so `put` refuses it.
#[derive(Clone, Default)]
pub struct ResponseStore {
    inner: Arc<RwLock<Entries>>,
}

#[derive(Default)]
struct Entries {
    epoch: u64,
    responses: HashMap<ResponseKey, CachedResponse>,
}

impl ResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current eviction epoch; capture it before rendering a response.
    pub async fn epoch(&self) -> u64 {
        self.inner.read().await.epoch
    }

    pub async fn get(&self, key: &ResponseKey) -> Option<Response<Body>> {
        let guard = self.inner.read().await;
        match guard.responses.get(key) {
            Some(cached) => {
                counter!("tsuzuri_response_cache_hit_total").increment(1);
                Some(cached.clone().into_response())
            }
            None => {
                counter!("tsuzuri_response_cache_miss_total").increment(1);
                None
            }
        }
    }

    /// Store a response rendered at `rendered_at` epoch. Returns `false`
    /// without storing when an eviction happened in between.
    pub async fn put(&self, key: ResponseKey, response: CachedResponse, rendered_at: u64) -> bool {
        let mut guard = self.inner.write().await;
        if guard.epoch != rendered_at {
            debug!(
                target = SOURCE,
                page = %key.page,
                "dropping response rendered before an eviction"
            );
            return false;
        }
        // Entries rendered for an earlier day can never be served again.
        guard.responses.retain(|existing, _| existing.day >= key.day);
        guard.responses.insert(key, response);
        true
    }

    /// Drop every cached response for the given pages, on any day.
    pub async fn evict(&self, pages: &[PageKey]) -> usize {
        let mut guard = self.inner.write().await;
        guard.epoch = guard.epoch.wrapping_add(1);
        let before = guard.responses.len();
        guard.responses.retain(|key, _| !pages.contains(&key.page));
        before - guard.responses.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.responses.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.responses.is_empty()
    }
}

#[async_trait]
impl RenderInvalidator for ResponseStore {
    fn name(&self) -> &'static str {
        "response_cache"
    }

    async fn invalidate(&self, pages: &[PageKey]) -> Result<(), InvalidationError> {
        let evicted = self.evict(pages).await;
        debug!(target = SOURCE, evicted, pages = pages.len(), "response cache evicted");
        Ok(())
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.clear();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        response
    }
}
