//! Draft generation handler

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tsuzuri_api_types::GeneratePostRequest;

use super::generate_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::GeneratedDraftResponse;
use crate::infra::http::api::state::ApiState;

pub async fn generate_post(
    State(state): State<ApiState>,
    Json(payload): Json<GeneratePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state
        .generation
        .generate(payload)
        .await
        .map_err(generate_to_api)?;

    Ok((StatusCode::CREATED, Json(GeneratedDraftResponse::from(draft))))
}
