//! Posts handlers

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tsuzuri_api_types::{BindImageRequest, PostStatusRequest, PostWriteRequest};

use super::post_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::PostListResponse;
use crate::infra::http::api::state::ApiState;

pub async fn list_posts(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let posts = state.posts.list_all().await.map_err(post_to_api)?;
    Ok(Json(PostListResponse::from(posts)))
}

pub async fn get_post(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.posts.get_by_slug(&slug).await.map_err(post_to_api)?;
    Ok(Json(post))
}

pub async fn create_post(
    State(state): State<ApiState>,
    Json(payload): Json<PostWriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .posts
        .create_manual(payload)
        .await
        .map_err(post_to_api)?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
    Json(payload): Json<PostWriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .posts
        .update_full_record(&slug, payload)
        .await
        .map_err(post_to_api)?;

    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.posts.delete(&slug).await.map_err(post_to_api)?;
    Ok(Json(removed))
}

pub async fn update_post_status(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
    Json(payload): Json<PostStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .posts
        .set_status(&slug, payload)
        .await
        .map_err(post_to_api)?;

    Ok(Json(post))
}

pub async fn bind_post_image(
    State(state): State<ApiState>,
    Path((slug, placeholder)): Path<(String, String)>,
    Json(payload): Json<BindImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .posts
        .bind_image(&slug, &placeholder, &payload.url)
        .await
        .map_err(post_to_api)?;

    Ok(Json(post))
}

pub async fn unbind_post_image(
    State(state): State<ApiState>,
    Path((slug, placeholder)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .posts
        .unbind_image(&slug, &placeholder)
        .await
        .map_err(post_to_api)?;

    Ok(Json(post))
}
