use serde::Serialize;
use tsuzuri_api_types::ImagePrompt;

use crate::application::generation::DraftPost;
use crate::domain::entities::BlogPost;

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub total: usize,
    pub posts: Vec<BlogPost>,
}

impl From<Vec<BlogPost>> for PostListResponse {
    fn from(posts: Vec<BlogPost>) -> Self {
        Self {
            total: posts.len(),
            posts,
        }
    }
}

/// Stored draft plus one brief per placeholder in its content.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDraftResponse {
    pub post: BlogPost,
    pub image_prompts: Vec<ImagePrompt>,
}

impl From<DraftPost> for GeneratedDraftResponse {
    fn from(draft: DraftPost) -> Self {
        Self {
            post: draft.post,
            image_prompts: draft.image_prompts,
        }
    }
}
