//! Request and response types shared by the Tsuzuri HTTP API and its clients.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::Date;

time::serde::format_description!(pub calendar_date, Date, "[year]-[month]-[day]");

/// Publication state of a blog post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full-record payload used by manual creation and by full updates.
///
/// On update the slug is taken from the path and `slug` here is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWriteRequest {
    #[serde(default)]
    pub slug: Option<String>,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, with = "calendar_date::option")]
    pub publish_date: Option<Date>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub images: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub read_time: String,
    #[serde(default)]
    pub tool_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStatusRequest {
    pub status: PostStatus,
    #[serde(default, with = "calendar_date::option")]
    pub publish_date: Option<Date>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePostRequest {
    pub topic: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePrompt {
    /// Placeholder identifier (`hero`, `1`, `2`, ...).
    pub placeholder: String,
    /// Literal token as it appears in the markdown, e.g. `[IMAGE_1]`.
    pub token: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindImageRequest {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub checksum: String,
}

/// Listing entry for publicly visible posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPostSummary {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub category: String,
    pub tags: BTreeSet<String>,
    pub author: String,
    #[serde(with = "calendar_date::option")]
    pub publish_date: Option<Date>,
    pub read_time: String,
    pub hero_image: Option<String>,
    pub is_new: bool,
}

/// A single visible post with its placeholders resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPost {
    #[serde(flatten)]
    pub summary: PublicPostSummary,
    pub description: String,
    pub keywords: Vec<String>,
    pub tool_link: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn write_request_defaults_to_draft() {
        let request: PostWriteRequest =
            serde_json::from_str(r#"{"title":"t","content":"body"}"#).expect("parse");
        assert_eq!(request.status, PostStatus::Draft);
        assert!(request.publish_date.is_none());
        assert!(request.images.is_empty());
    }

    #[test]
    fn status_request_parses_calendar_date() {
        let request: PostStatusRequest =
            serde_json::from_str(r#"{"status":"scheduled","publishDate":"2026-10-19"}"#)
                .expect("parse");
        assert_eq!(request.status, PostStatus::Scheduled);
        assert_eq!(request.publish_date, Some(date!(2026 - 10 - 19)));
    }
}
