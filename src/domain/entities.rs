//! Domain entities mirrored from the persisted collection file.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use tsuzuri_api_types::calendar_date;

use crate::domain::{placeholders::Placeholder, types::PostStatus};

/// A blog record as stored in the collection file.
///
/// Field names are camelCase on disk; `slug` is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default, with = "calendar_date::option")]
    pub publish_date: Option<Date>,
    #[serde(default)]
    pub status: PostStatus,
    /// Placeholder key (`hero`, `1`, `2`, ...) to public image URL.
    #[serde(default)]
    pub images: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub read_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_link: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BlogPost {
    /// Start a draft with empty metadata; the store stamps the timestamps on commit.
    pub fn draft(slug: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            slug: slug.into(),
            title: title.into(),
            excerpt: String::new(),
            content: content.into(),
            category: String::new(),
            tags: BTreeSet::new(),
            author: String::new(),
            publish_date: None,
            status: PostStatus::Draft,
            images: BTreeMap::new(),
            description: String::new(),
            keywords: Vec::new(),
            read_time: String::new(),
            tool_link: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Placeholders referenced by `content`, in order of first appearance.
    pub fn placeholders(&self) -> Vec<Placeholder> {
        Placeholder::scan(&self.content)
    }

    /// Placeholder keys present in `content` that have no bound image.
    pub fn unbound_placeholders(&self) -> Vec<String> {
        self.placeholders()
            .into_iter()
            .map(|placeholder| placeholder.key())
            .filter(|key| !self.images.contains_key(key))
            .collect()
    }

    /// Drop bindings whose placeholder no longer appears in `content`.
    pub fn prune_stale_images(&mut self) {
        let live: BTreeSet<String> = self
            .placeholders()
            .into_iter()
            .map(|placeholder| placeholder.key())
            .collect();
        self.images.retain(|key, _| live.contains(key));
    }

    pub fn hero_image(&self) -> Option<&str> {
        self.images
            .get(&Placeholder::Hero.key())
            .map(String::as_str)
    }
}
