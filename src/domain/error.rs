use thiserror::Error;

use super::types::PostStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("slug `{slug}` already exists")]
    DuplicateSlug { slug: String },
    #[error("cannot move post from `{from}` to `{to}`")]
    InvalidTransition { from: PostStatus, to: PostStatus },
    #[error("placeholders without a bound image: {}", placeholders.join(", "))]
    UnresolvedPlaceholders { placeholders: Vec<String> },
    #[error("placeholder `{placeholder}` does not appear in the post content")]
    UnknownPlaceholder { placeholder: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn duplicate_slug(slug: impl Into<String>) -> Self {
        Self::DuplicateSlug { slug: slug.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
