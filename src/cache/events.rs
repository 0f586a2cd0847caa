//! Change events emitted after committed store mutations.

use super::keys::PageKey;

/// What happened to the post collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A post was created or updated (content, images or status).
    PostUpserted { slug: String },
    /// A post was deleted.
    PostDeleted { slug: String },
}

impl EventKind {
    pub fn slug(&self) -> &str {
        match self {
            EventKind::PostUpserted { slug } | EventKind::PostDeleted { slug } => slug,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PostUpserted { .. } => "post_upserted",
            EventKind::PostDeleted { .. } => "post_deleted",
        }
    }

    /// Rendered pages that are stale after this event.
    pub fn affected_pages(&self) -> Vec<PageKey> {
        PageKey::for_post(self.slug())
    }
}
