//! Public read routes: the pages the invalidation notifier refers to.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::error;

use crate::{
    application::{
        error::HttpError,
        posts::{PostService, PostServiceError},
        repos::{ObjectStorage, StorageError, StoredObject},
    },
    cache::{CacheState, response_cache_layer},
};

use super::{
    RouterState, post_error_to_http,
    middleware::{log_responses, set_request_context},
};

/// Number of posts shown on the site root.
pub const ROOT_POST_LIMIT: usize = 5;

#[derive(Clone)]
pub struct HttpState {
    pub posts: Arc<PostService>,
    pub storage: Arc<dyn ObjectStorage>,
    pub cache: CacheState,
}

pub fn build_router(state: RouterState) -> Router<RouterState> {
    let cached_routes = Router::new()
        .route("/", get(index))
        .route("/blog", get(listing))
        .route("/blog/{slug}", get(post_detail))
        .layer(middleware::from_fn_with_state(
            state.http.cache.clone(),
            response_cache_layer,
        ));

    let static_routes = Router::new().route("/media/{key}", get(serve_media));

    cached_routes
        .merge(static_routes)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let mut posts = state
        .posts
        .public_listing()
        .await
        .map_err(|err| post_error_to_http("infra::http::public::index", err))?;
    posts.truncate(ROOT_POST_LIMIT);
    Ok(Json(posts).into_response())
}

async fn listing(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let posts = state
        .posts
        .public_listing()
        .await
        .map_err(|err| post_error_to_http("infra::http::public::listing", err))?;
    Ok(Json(posts).into_response())
}

async fn post_detail(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Response, HttpError> {
    match state.posts.public_post(&slug).await {
        Ok(post) => Ok(Json(post).into_response()),
        Err(PostServiceError::NotFound { .. }) => Err(HttpError::new(
            "infra::http::public::post_detail",
            StatusCode::NOT_FOUND,
            "Post not found",
            format!("post `{slug}` is not visible"),
        )),
        Err(err) => Err(post_error_to_http(
            "infra::http::public::post_detail",
            err,
        )),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(key): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.storage.get(&key).await {
        Ok(object) => build_media_response(object),
        Err(StorageError::NotFound { .. } | StorageError::InvalidKey { .. }) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Image not found",
            "The requested image is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                key = %key,
                error = %err,
                "failed to read stored image"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read stored image",
                &err,
            )
            .into_response()
        }
    }
}

fn build_media_response(object: StoredObject) -> Response {
    let length = object.bytes.len();
    let mut response = (StatusCode::OK, object.bytes).into_response();
    let headers = response.headers_mut();

    // Only image types are served inline.
    let content_type = if object.content_type.starts_with("image/")
        && object.content_type != "image/svg+xml"
    {
        HeaderValue::from_str(&object.content_type).ok()
    } else {
        None
    };
    headers.insert(
        CONTENT_TYPE,
        content_type.unwrap_or_else(|| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    // Keys are never reused, so stored images never change.
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn object(content_type: &str) -> StoredObject {
        StoredObject {
            content_type: content_type.to_string(),
            bytes: Bytes::from_static(b"<html><script>alert(1)</script></html>"),
        }
    }

    #[test]
    fn media_responses_forbid_sniffing() {
        let response = build_media_response(object("image/png"));
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[test]
    fn non_image_objects_are_served_as_opaque_bytes() {
        for content_type in ["text/html", "image/svg+xml"] {
            let response = build_media_response(object(content_type));
            assert_eq!(
                response.headers()[CONTENT_TYPE],
                "application/octet-stream",
                "{content_type}"
            );
        }
    }
}
