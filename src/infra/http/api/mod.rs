pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::infra::http::RouterState;
use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let upload_limit = state.api.upload_limit_bytes;

    Router::new()
        .route(
            "/api/v1/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route("/api/v1/posts/generate", post(handlers::generate_post))
        .route(
            "/api/v1/posts/{slug}",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route(
            "/api/v1/posts/{slug}/status",
            post(handlers::update_post_status),
        )
        .route(
            "/api/v1/posts/{slug}/images/{placeholder}",
            put(handlers::bind_post_image).delete(handlers::unbind_post_image),
        )
        .route(
            "/api/v1/uploads",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
