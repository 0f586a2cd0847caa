use std::collections::BTreeMap;

use thiserror::Error;
use tsuzuri_api_types::PostWriteRequest;

use crate::{
    domain::{entities::BlogPost, error::DomainError, placeholders::Placeholder, slug::SlugError},
    infra::store::StoreError,
};

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error("post `{slug}` not found")]
    NotFound { slug: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PostServiceError {
    pub fn not_found(slug: impl Into<String>) -> Self {
        Self::NotFound { slug: slug.into() }
    }
}

/// Copy the editable fields of a write request onto `post`.
///
/// Identity (`slug`, `createdAt`) and lifecycle (`status`, `publishDate`) are
/// left alone; callers apply those through the state machine.
pub(crate) fn apply_write_fields(post: &mut BlogPost, request: &PostWriteRequest, default_author: &str) {
    post.title = request.title.trim().to_string();
    post.excerpt = request.excerpt.trim().to_string();
    post.content = request.content.clone();
    post.category = request.category.trim().to_string();
    post.tags = request
        .tags
        .iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    post.author = request
        .author
        .as_deref()
        .map(str::trim)
        .filter(|author| !author.is_empty())
        .unwrap_or(default_author)
        .to_string();
    post.images = request.images.clone();
    post.description = request.description.trim().to_string();
    post.keywords = request
        .keywords
        .iter()
        .map(|keyword| keyword.trim().to_string())
        .filter(|keyword| !keyword.is_empty())
        .collect();
    post.read_time = request.read_time.trim().to_string();
    post.tool_link = request
        .tool_link
        .as_deref()
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .map(str::to_string);
}

/// Normalize image keys to their canonical spelling (`IMAGE_1` → `1`).
pub(crate) fn canonical_image_keys(post: &mut BlogPost) -> Result<(), DomainError> {
    let mut canonical = BTreeMap::new();
    for (key, url) in std::mem::take(&mut post.images) {
        let placeholder = Placeholder::from_key(&key)
            .ok_or(DomainError::UnknownPlaceholder { placeholder: key })?;
        canonical.insert(placeholder.key(), url);
    }
    post.images = canonical;
    Ok(())
}
