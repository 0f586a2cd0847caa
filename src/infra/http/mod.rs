pub mod api;
mod middleware;
mod public;

pub use api::{ApiState, build_api_router};
pub use middleware::REQUEST_ID_HEADER;
pub use public::{HttpState, ROOT_POST_LIMIT, build_router};

use axum::Router;
use axum::extract::FromRef;
use axum::http::StatusCode;

use crate::application::error::HttpError;
use crate::application::posts::PostServiceError;
use crate::infra::store::StoreError;

/// Map a post service error to an HTTP error for the public pages.
pub fn post_error_to_http(source: &'static str, err: PostServiceError) -> HttpError {
    match err {
        PostServiceError::NotFound { slug } => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Post not found",
            format!("post `{slug}` not found"),
        ),
        PostServiceError::Store(StoreError::Corrupt { .. }) => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Post store is corrupt",
            &err,
        ),
        other => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &other,
        ),
    }
}

#[derive(Clone)]
pub struct RouterState {
    pub http: HttpState,
    pub api: ApiState,
}

impl FromRef<RouterState> for HttpState {
    fn from_ref(state: &RouterState) -> Self {
        state.http.clone()
    }
}

impl FromRef<RouterState> for ApiState {
    fn from_ref(state: &RouterState) -> Self {
        state.api.clone()
    }
}

/// Public pages and the JSON API on one router.
pub fn build_application_router(state: RouterState) -> Router {
    build_router(state.clone())
        .merge(build_api_router(state.clone()))
        .with_state(state)
}
