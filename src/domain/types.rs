//! Shared domain enumerations aligned with the persisted collection format.

pub use tsuzuri_api_types::PostStatus;

/// Whether a post in `status` must carry a `publishDate`.
///
/// Drafts may omit the date; scheduled and published posts are ordered and
/// filtered by it.
pub fn requires_publish_date(status: PostStatus) -> bool {
    matches!(status, PostStatus::Scheduled | PostStatus::Published)
}
