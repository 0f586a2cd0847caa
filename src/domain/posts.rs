//! The post collection and the publication state machine.

use serde::{Deserialize, Serialize};
use time::Date;
use url::Url;

use super::entities::BlogPost;
use super::error::DomainError;
use super::placeholders::Placeholder;
use super::types::{PostStatus, requires_publish_date};

/// Ordered set of posts keyed by slug; the unit of atomic persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostCollection {
    posts: Vec<BlogPost>,
}

impl PostCollection {
    pub fn new() -> Self {
        Self { posts: Vec::new() }
    }

    /// Build a collection, rejecting duplicate slugs.
    pub fn from_posts(posts: Vec<BlogPost>) -> Result<Self, DomainError> {
        let collection = Self { posts };
        collection.ensure_unique_slugs()?;
        Ok(collection)
    }

    pub fn posts(&self) -> &[BlogPost] {
        &self.posts
    }

    pub fn into_posts(self) -> Vec<BlogPost> {
        self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlogPost> {
        self.posts.iter()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.find(slug).is_some()
    }

    pub fn find(&self, slug: &str) -> Option<&BlogPost> {
        self.posts.iter().find(|post| post.slug == slug)
    }

    pub fn find_mut(&mut self, slug: &str) -> Option<&mut BlogPost> {
        self.posts.iter_mut().find(|post| post.slug == slug)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut BlogPost> {
        self.posts.iter_mut()
    }

    /// Append a new post. Never overwrites an existing slug.
    pub fn insert(&mut self, post: BlogPost) -> Result<(), DomainError> {
        if self.contains(&post.slug) {
            return Err(DomainError::duplicate_slug(post.slug));
        }
        self.posts.push(post);
        Ok(())
    }

    /// Remove and return the post with `slug`.
    pub fn remove(&mut self, slug: &str) -> Option<BlogPost> {
        let index = self.posts.iter().position(|post| post.slug == slug)?;
        Some(self.posts.remove(index))
    }

    pub fn ensure_unique_slugs(&self) -> Result<(), DomainError> {
        let mut seen = std::collections::HashSet::with_capacity(self.posts.len());
        for post in &self.posts {
            if !seen.insert(post.slug.as_str()) {
                return Err(DomainError::duplicate_slug(post.slug.clone()));
            }
        }
        Ok(())
    }
}

/// Check field-level invariants of a record about to be stored.
pub fn validate_post(post: &BlogPost) -> Result<(), DomainError> {
    if post.slug.trim().is_empty() {
        return Err(DomainError::validation("slug must not be empty"));
    }
    if post.title.trim().is_empty() {
        return Err(DomainError::validation("title must not be empty"));
    }
    if post.content.trim().is_empty() {
        return Err(DomainError::validation("content must not be empty"));
    }
    if Placeholder::hero_count(&post.content) > 1 {
        return Err(DomainError::validation(
            "content may contain at most one [IMAGE_HERO] placeholder",
        ));
    }

    let live = post.placeholders();
    for (key, url) in &post.images {
        validate_image_url(url)?;
        let known = Placeholder::from_key(key).is_some_and(|placeholder| live.contains(&placeholder));
        if !known {
            return Err(DomainError::UnknownPlaceholder {
                placeholder: key.clone(),
            });
        }
    }

    if requires_publish_date(post.status) && post.publish_date.is_none() {
        return Err(DomainError::validation(format!(
            "a {} post requires a publishDate",
            post.status
        )));
    }
    if post.status != PostStatus::Draft {
        ensure_fully_bound(post)?;
    }

    Ok(())
}

/// Accept an absolute `http(s)` URL or a rooted path such as `/media/a.png`.
///
/// The value is pasted into `![alt](url)` at read time, so characters that
/// end or split a markdown link destination are refused.
pub fn validate_image_url(value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::validation("image url must not be empty"));
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '(' | ')' | '<' | '>' | '[' | ']'))
    {
        return Err(DomainError::validation(format!(
            "image url `{value}` contains characters not allowed in a link"
        )));
    }

    if value.starts_with('/') && !value.starts_with("//") {
        return Ok(());
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(DomainError::validation(format!(
            "image url `{value}` must be an http(s) URL or a rooted path"
        ))),
    }
}

fn ensure_fully_bound(post: &BlogPost) -> Result<(), DomainError> {
    let unbound = post.unbound_placeholders();
    if unbound.is_empty() {
        Ok(())
    } else {
        Err(DomainError::UnresolvedPlaceholders {
            placeholders: unbound,
        })
    }
}

/// Apply a publication transition in place.
///
/// `today` is the current calendar day in the site's offset. `requested_date`
/// is the caller-supplied `publishDate`, if any.
pub fn apply_transition(
    post: &mut BlogPost,
    target: PostStatus,
    requested_date: Option<Date>,
    today: Date,
) -> Result<(), DomainError> {
    let from = post.status;

    match (from, target) {
        (_, PostStatus::Draft) => {
            if let Some(date) = requested_date {
                post.publish_date = Some(date);
            }
        }
        (PostStatus::Draft | PostStatus::Scheduled, PostStatus::Scheduled) => {
            let date = requested_date
                .ok_or_else(|| DomainError::validation("scheduling requires a publishDate"))?;
            if date <= today {
                return Err(DomainError::validation(format!(
                    "scheduled publishDate {date} must be after {today}"
                )));
            }
            ensure_fully_bound(post)?;
            post.publish_date = Some(date);
        }
        (PostStatus::Published, PostStatus::Scheduled) => {
            return Err(DomainError::InvalidTransition { from, to: target });
        }
        (PostStatus::Published, PostStatus::Published) => {}
        (PostStatus::Draft | PostStatus::Scheduled, PostStatus::Published) => {
            ensure_fully_bound(post)?;
            let date = match requested_date.or(post.publish_date) {
                Some(date) if date <= today => date,
                _ => today,
            };
            post.publish_date = Some(date);
        }
    }

    post.status = target;
    Ok(())
}
