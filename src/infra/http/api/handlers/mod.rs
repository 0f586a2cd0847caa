//! API handlers organized by resource type.
//!
//! Error conversions shared by the resource modules live here.

mod generation;
mod posts;
mod uploads;

pub use generation::*;
pub use posts::*;
pub use uploads::*;

use axum::http::StatusCode;

use crate::application::generation::GenerateError;
use crate::application::posts::PostServiceError;
use crate::application::uploads::IngestError;
use crate::domain::error::DomainError;
use crate::domain::slug::SlugError;
use crate::infra::store::StoreError;

use super::error::{ApiError, codes};

pub(crate) fn store_to_api(err: StoreError) -> ApiError {
    match err {
        StoreError::Corrupt { .. } => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::CORRUPT_STORE,
            "Post store is corrupt",
            Some(err.to_string()),
        ),
        StoreError::DuplicateSlug { slug } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE_SLUG,
            "Slug already in use",
            Some(slug),
        ),
        other => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::STORAGE,
            "Post store unavailable",
            Some(other.to_string()),
        ),
    }
}

pub(crate) fn domain_to_api(err: DomainError) -> ApiError {
    match err {
        DomainError::DuplicateSlug { slug } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE_SLUG,
            "Slug already in use",
            Some(slug),
        ),
        DomainError::InvalidTransition { .. } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INVALID_TRANSITION,
            "Status change not allowed",
            Some(err.to_string()),
        ),
        DomainError::UnresolvedPlaceholders { .. }
        | DomainError::UnknownPlaceholder { .. }
        | DomainError::Validation { .. } => {
            ApiError::bad_request("Invalid post", Some(err.to_string()))
        }
    }
}

pub(crate) fn slug_to_api(err: SlugError) -> ApiError {
    ApiError::bad_request("Invalid slug", Some(err.to_string()))
}

pub(crate) fn post_to_api(err: PostServiceError) -> ApiError {
    match err {
        PostServiceError::NotFound { slug } => ApiError::not_found("post not found", Some(slug)),
        PostServiceError::Domain(domain) => domain_to_api(domain),
        PostServiceError::Slug(slug) => slug_to_api(slug),
        PostServiceError::Store(store) => store_to_api(store),
    }
}

pub(crate) fn generate_to_api(err: GenerateError) -> ApiError {
    match err {
        GenerateError::Failed { .. } | GenerateError::Upstream(_) => ApiError::new(
            StatusCode::BAD_GATEWAY,
            codes::GENERATION_FAILED,
            "Draft generation failed",
            Some(err.to_string()),
        ),
        GenerateError::Slug(slug) => slug_to_api(slug),
        GenerateError::Domain(domain) => domain_to_api(domain),
        GenerateError::Store(store) => store_to_api(store),
    }
}

pub(crate) fn ingest_to_api(err: IngestError) -> ApiError {
    match err {
        IngestError::InvalidMedia { reason } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_MEDIA,
            "Upload is not an acceptable image",
            Some(reason),
        ),
        IngestError::Storage(storage) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::STORAGE,
            "Failed to store upload",
            Some(storage.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PostStatus;

    #[test]
    fn post_errors_keep_distinguishable_codes() {
        let cases = [
            (PostServiceError::not_found("gone"), codes::NOT_FOUND),
            (
                PostServiceError::from(DomainError::duplicate_slug("taken")),
                codes::DUPLICATE_SLUG,
            ),
            (
                PostServiceError::from(DomainError::InvalidTransition {
                    from: PostStatus::Published,
                    to: PostStatus::Published,
                }),
                codes::INVALID_TRANSITION,
            ),
            (
                PostServiceError::from(DomainError::validation("bad")),
                codes::INVALID_INPUT,
            ),
            (
                PostServiceError::from(StoreError::Writer("joined".to_string())),
                codes::STORAGE,
            ),
        ];

        for (error, code) in cases {
            assert_eq!(post_to_api(error).code(), code);
        }
    }

    #[test]
    fn upstream_failures_map_to_bad_gateway() {
        let api = generate_to_api(GenerateError::from(
            crate::application::repos::GenerationError::Timeout { seconds: 120 },
        ));
        assert_eq!(api.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(api.code(), codes::GENERATION_FAILED);
    }

    #[test]
    fn invalid_media_is_a_client_error() {
        let api = ingest_to_api(IngestError::InvalidMedia {
            reason: "empty".to_string(),
        });
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.code(), codes::INVALID_MEDIA);
    }
}
