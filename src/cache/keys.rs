//! Cache key definitions.
//!
//! `PageKey` names a rendered public page; `ResponseKey` pins a cached
//! response to the calendar day it was rendered for, because visibility of
//! scheduled posts changes at day boundaries without any store mutation.

use std::fmt;

use time::Date;

/// A rendered page that depends on post data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageKey {
    /// Site root showing the latest posts.
    Root,
    /// Blog listing.
    Listing,
    /// A single post page.
    Post(String),
}

impl PageKey {
    /// Pages affected by a change to the post with `slug`.
    pub fn for_post(slug: &str) -> Vec<PageKey> {
        vec![PageKey::Root, PageKey::Listing, PageKey::Post(slug.to_string())]
    }

    /// Map a public request path onto the page it renders.
    pub fn from_path(path: &str) -> Option<PageKey> {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Some(PageKey::Root),
            "/blog" => Some(PageKey::Listing),
            _ => trimmed
                .strip_prefix("/blog/")
                .filter(|slug| !slug.is_empty() && !slug.contains('/'))
                .map(|slug| PageKey::Post(slug.to_string())),
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKey::Root => f.write_str("root"),
            PageKey::Listing => f.write_str("listing"),
            PageKey::Post(slug) => write!(f, "post:{slug}"),
        }
    }
}

/// Response cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    pub page: PageKey,
    pub day: Date,
}
