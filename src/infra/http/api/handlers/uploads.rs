//! Uploads handlers

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tsuzuri_api_types::UploadResponse;

use super::ingest_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

const UPLOAD_FIELDS: [&str; 2] = ["image", "file"];

pub async fn upload_image(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut filename = None;
    let mut content_type = None;
    let mut data: Option<bytes::Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request("invalid multipart payload", Some(err.to_string())))?
    {
        if field.name().is_some_and(|name| UPLOAD_FIELDS.contains(&name)) {
            filename = field.file_name().map(|s| s.to_string());
            content_type = field.content_type().map(|s| s.to_string());
            data = Some(field.bytes().await.map_err(|err| {
                ApiError::bad_request("failed to read upload", Some(err.to_string()))
            })?);
            break;
        }
    }

    let data = data.ok_or_else(|| {
        ApiError::bad_request(
            "missing image",
            Some("expected a multipart field named `image` or `file`".to_string()),
        )
    })?;

    let image = state
        .uploads
        .ingest(filename.as_deref(), content_type.as_deref(), data)
        .await
        .map_err(ingest_to_api)?;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(image))))
}
