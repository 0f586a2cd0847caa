use std::sync::Arc;

use crate::application::generation::GenerationService;
use crate::application::posts::PostService;
use crate::application::uploads::ImageIngestService;

#[derive(Clone)]
pub struct ApiState {
    pub posts: Arc<PostService>,
    pub generation: Arc<GenerationService>,
    pub uploads: Arc<ImageIngestService>,
    /// Upper bound for a whole multipart upload request.
    pub upload_limit_bytes: usize,
}
