//! Draft generation from a topic.
//!
//! One call to the text generator produces a markdown article carrying image
//! placeholders. The article is stored as a draft with no images bound; the
//! caller receives one image brief per placeholder so images can be produced
//! and uploaded separately.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};
use tsuzuri_api_types::{GeneratePostRequest, ImagePrompt};

use crate::application::repos::{GenerationError, TextGenerator};
use crate::cache::InvalidationNotifier;
use crate::domain::entities::BlogPost;
use crate::domain::error::DomainError;
use crate::domain::placeholders::Placeholder;
use crate::domain::posts::validate_post;
use crate::domain::slug::{SlugError, generate_unique_slug};
use crate::infra::store::{PostStore, StoreError};

const SOURCE: &str = "application::generation";
const EXCERPT_MAX_CHARS: usize = 160;
const DEFAULT_READ_TIME: &str = "5分";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generation failed: {reason}")]
    Failed { reason: String },
    #[error(transparent)]
    Upstream(#[from] GenerationError),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GenerateError {
    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Number of numbered `[IMAGE_n]` placeholders requested besides the hero.
    pub image_slots: u32,
    pub timeout: Duration,
    pub default_author: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            image_slots: 3,
            timeout: Duration::from_secs(120),
            default_author: "Editorial Team".to_string(),
        }
    }
}

/// A freshly generated draft and the image briefs for its placeholders.
#[derive(Debug, Clone)]
pub struct DraftPost {
    pub post: BlogPost,
    pub image_prompts: Vec<ImagePrompt>,
}

#[derive(Clone)]
pub struct GenerationService {
    generator: Arc<dyn TextGenerator>,
    store: Arc<PostStore>,
    notifier: InvalidationNotifier,
    options: GenerationOptions,
}

impl GenerationService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<PostStore>,
        notifier: InvalidationNotifier,
        options: GenerationOptions,
    ) -> Self {
        Self {
            generator,
            store,
            notifier,
            options,
        }
    }

    pub async fn generate(&self, request: GeneratePostRequest) -> Result<DraftPost, GenerateError> {
        let topic = request.topic.trim().to_string();
        if topic.is_empty() {
            return Err(DomainError::validation("topic must not be empty").into());
        }
        let category = request.category.trim().to_string();

        let instruction = build_instruction(
            &topic,
            &category,
            request.style.as_deref(),
            self.options.image_slots,
        );

        let text = match timeout(self.options.timeout, self.generator.generate(&instruction)).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                counter!("tsuzuri_generation_failure_total").increment(1);
                warn!(target = SOURCE, topic = %topic, error = %err, "text generation failed");
                return Err(err.into());
            }
            Err(_) => {
                counter!("tsuzuri_generation_failure_total").increment(1);
                warn!(target = SOURCE, topic = %topic, "text generation timed out");
                return Err(GenerationError::Timeout {
                    seconds: self.options.timeout.as_secs(),
                }
                .into());
            }
        };

        let article = parse_article(&text, &topic);
        let placeholders = Placeholder::scan(&article.content);
        if placeholders.is_empty() {
            counter!("tsuzuri_generation_failure_total").increment(1);
            return Err(GenerateError::failed("generated content contains no image placeholder"));
        }
        if Placeholder::hero_count(&article.content) > 1 {
            counter!("tsuzuri_generation_failure_total").increment(1);
            return Err(GenerateError::failed(
                "generated content contains more than one [IMAGE_HERO]",
            ));
        }

        let image_prompts = placeholders
            .iter()
            .map(|placeholder| image_prompt(*placeholder, &topic))
            .collect();

        let default_author = self.options.default_author.clone();
        let post = self
            .store
            .mutate(move |collection| {
                let slug = generate_unique_slug(&topic, |candidate| !collection.contains(candidate))
                    .or_else(|_| {
                        generate_unique_slug(&article.title, |candidate| {
                            !collection.contains(candidate)
                        })
                    })?;

                let mut post = BlogPost::draft(slug, article.title.clone(), article.content.clone());
                post.excerpt = if article.description.trim().is_empty() {
                    first_paragraph(&article.content)
                } else {
                    truncate_chars(article.description.trim(), EXCERPT_MAX_CHARS)
                };
                post.description = article.description.trim().to_string();
                post.category = category;
                post.tags = article.tags.iter().map(|tag| tag.trim().to_string()).filter(|tag| !tag.is_empty()).collect();
                post.keywords = article.keywords.clone();
                post.read_time = if article.read_time.trim().is_empty() {
                    DEFAULT_READ_TIME.to_string()
                } else {
                    article.read_time.trim().to_string()
                };
                post.tool_link = article.tool_link.clone().filter(|link| !link.trim().is_empty());
                post.author = default_author;
                validate_post(&post)?;

                collection.insert(post.clone())?;
                Ok::<_, GenerateError>(post)
            })
            .await?;

        info!(
            target = SOURCE,
            slug = %post.slug,
            placeholders = post.placeholders().len(),
            "draft generated"
        );
        self.notifier.post_upserted(&post.slug).await;

        let post = self
            .store
            .load()
            .await?
            .find(&post.slug)
            .cloned()
            .unwrap_or(post);

        Ok(DraftPost {
            post,
            image_prompts,
        })
    }
}

/// Parsed generator answer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedArticle {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    content: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    read_time: String,
    #[serde(default)]
    tool_link: Option<String>,
}

fn build_instruction(topic: &str, category: &str, style: Option<&str>, image_slots: u32) -> String {
    let numbered: Vec<String> = (1..=image_slots)
        .map(|index| Placeholder::Numbered(index).token())
        .collect();
    let numbered_list = if numbered.is_empty() {
        "none".to_string()
    } else {
        numbered.join(", ")
    };
    let hero = Placeholder::Hero.token();
    let style = style
        .map(str::trim)
        .filter(|style| !style.is_empty())
        .unwrap_or("friendly and practical, written from hands-on experience with concrete numbers");
    let category = if category.is_empty() { "general" } else { category };

    format!(
        "Write a blog article in markdown.\n\
         \n\
         Topic: {topic}\n\
         Category: {category}\n\
         Tone: {style}\n\
         \n\
         Image placeholders:\n\
         - Put exactly one {hero} near the top, right after the introduction.\n\
         - Put these placeholders in order, each on its own line between sections: {numbered_list}.\n\
         - Do not invent other placeholders and do not repeat {hero}.\n\
         \n\
         Answer with a single JSON object inside a ```json fenced block:\n\
         {{\n\
           \"title\": \"catchy title, at most 60 characters\",\n\
           \"description\": \"meta description of about 150 characters\",\n\
           \"content\": \"the markdown article including the placeholders\",\n\
           \"tags\": [\"3-4 tags\"],\n\
           \"keywords\": [\"4-5 SEO keywords\"],\n\
           \"readTime\": \"estimated reading time\",\n\
           \"toolLink\": \"/{category}/related-tool\"\n\
         }}\n"
    )
}

/// Extract the article from a generator answer.
///
/// Tries a ```` ```json ```` fence, then a bare fence, then the whole text,
/// then the outermost braces. Falls back to the raw text as the body with
/// `topic` as the title.
fn parse_article(text: &str, topic: &str) -> GeneratedArticle {
    let candidates = [
        fenced_block(text, "```json"),
        fenced_block(text, "```"),
        Some(text.trim()),
        outer_braces(text),
    ];

    let mut article = candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| serde_json::from_str::<GeneratedArticle>(candidate).ok())
        .unwrap_or_else(|| GeneratedArticle {
            content: text.trim().to_string(),
            ..GeneratedArticle::default()
        });

    if article.title.trim().is_empty() {
        article.title = topic.to_string();
    } else {
        article.title = article.title.trim().to_string();
    }
    article
}

fn fenced_block<'a>(text: &'a str, opening: &str) -> Option<&'a str> {
    let start = text.find(opening)? + opening.len();
    let body_start = start + text[start..].find('\n')? + 1;
    let end = body_start + text[body_start..].find("```")?;
    Some(text[body_start..end].trim())
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// First prose paragraph of `content`, skipping headings and placeholder lines.
fn first_paragraph(content: &str) -> String {
    content
        .split("\n\n")
        .map(str::trim)
        .find(|block| {
            !block.is_empty()
                && !block.starts_with('#')
                && !block.starts_with("```")
                && Placeholder::scan(block).is_empty()
        })
        .map(|block| truncate_chars(&block.split_whitespace().collect::<Vec<_>>().join(" "), EXCERPT_MAX_CHARS))
        .unwrap_or_default()
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((index, _)) => format!("{}…", &value[..index]),
        None => value.to_string(),
    }
}

fn image_prompt(placeholder: Placeholder, topic: &str) -> ImagePrompt {
    let prompt = match placeholder {
        Placeholder::Hero => format!(
            "Hero image for a blog article about: {topic}. Modern professional setting, clean minimal style, no text in the image. 1200x675 (16:9), JPEG under 1MB."
        ),
        Placeholder::Numbered(index) => {
            let subject = match (index - 1) % 3 {
                0 => "Simple infographic showing the workflow or process",
                1 => "Step-by-step visual guide with numbered icons and arrows",
                _ => "Results or before/after comparison visual",
            };
            format!(
                "{subject} for: {topic}. Flat design, limited palette, minimal text. 800x600, JPEG under 1MB."
            )
        }
    };

    ImagePrompt {
        placeholder: placeholder.key(),
        token: placeholder.token(),
        prompt,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;

    struct Scripted {
        answer: Result<String, ()>,
        delay: Option<Duration>,
        instructions: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                delay: None,
                instructions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, instruction: &str) -> Result<String, GenerationError> {
            self.instructions
                .lock()
                .expect("instructions")
                .push(instruction.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer
                .clone()
                .map_err(|_| GenerationError::request("backend unavailable"))
        }
    }

    fn service(dir: &TempDir, generator: Arc<Scripted>, options: GenerationOptions) -> (GenerationService, Arc<PostStore>) {
        let store = Arc::new(PostStore::new(dir.path().join("posts.json")));
        (
            GenerationService::new(generator, store.clone(), InvalidationNotifier::disabled(), options),
            store,
        )
    }

    fn request(topic: &str) -> GeneratePostRequest {
        GeneratePostRequest {
            topic: topic.to_string(),
            category: "pdf".to_string(),
            style: None,
        }
    }

    const ANSWER: &str = "Sure!\n```json\n{\"title\": \"Shrink PDFs fast\", \"description\": \"How to compress PDFs.\", \"content\": \"# Shrink\\n\\nIntro text.\\n\\n[IMAGE_HERO]\\n\\n## Why\\n\\n[IMAGE_1]\\n\\n[IMAGE_2]\\n\\n[IMAGE_3]\", \"tags\": [\"pdf\"], \"keywords\": [\"compress\"], \"readTime\": \"4分\"}\n```\n";

    #[test]
    fn instruction_lists_requested_slots() {
        let text = build_instruction("topic", "pdf", None, 3);
        assert!(text.contains("[IMAGE_HERO]"));
        assert!(text.contains("[IMAGE_1], [IMAGE_2], [IMAGE_3]"));
        assert!(!text.contains("[IMAGE_4]"));
    }

    #[test]
    fn parse_article_reads_fenced_json() {
        let article = parse_article(ANSWER, "topic");
        assert_eq!(article.title, "Shrink PDFs fast");
        assert_eq!(article.read_time, "4分");
        assert_eq!(Placeholder::scan(&article.content).len(), 4);
    }

    #[test]
    fn parse_article_reads_bare_fence_and_raw_json() {
        let bare = "```\n{\"title\": \"T\", \"content\": \"[IMAGE_HERO]\"}\n```";
        assert_eq!(parse_article(bare, "topic").title, "T");
        let raw = "Here you go: {\"content\": \"[IMAGE_1]\"} thanks";
        let article = parse_article(raw, "topic");
        assert_eq!(article.title, "topic");
        assert_eq!(article.content, "[IMAGE_1]");
    }

    #[test]
    fn parse_article_falls_back_to_raw_markdown() {
        let article = parse_article("# Heading\n\n[IMAGE_HERO]\n\nBody", "My Topic");
        assert_eq!(article.title, "My Topic");
        assert!(article.content.starts_with("# Heading"));
    }

    #[test]
    fn first_paragraph_skips_headings_and_placeholders() {
        let excerpt = first_paragraph("# Title\n\n[IMAGE_HERO]\n\nThe  first\nparagraph.\n\nSecond.");
        assert_eq!(excerpt, "The first paragraph.");
    }

    #[tokio::test]
    async fn generate_creates_draft_with_prompts() {
        let dir = TempDir::new().expect("tempdir");
        let generator = Arc::new(Scripted::answering(ANSWER));
        let (service, store) = service(&dir, generator.clone(), GenerationOptions::default());

        let draft = service.generate(request("PDF compression tips")).await.expect("draft");

        assert_eq!(draft.post.slug, "pdf-compression-tips");
        assert_eq!(draft.post.excerpt, "How to compress PDFs.");
        assert!(draft.post.images.is_empty());
        assert_eq!(draft.image_prompts.len(), 4);
        assert_eq!(draft.image_prompts[0].placeholder, "hero");
        assert_eq!(store.load().await.expect("load").len(), 1);
        assert_eq!(generator.instructions.lock().expect("instructions").len(), 1);
    }

    #[tokio::test]
    async fn content_without_placeholders_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let generator = Arc::new(Scripted::answering("{\"title\": \"t\", \"content\": \"no images\"}"));
        let (service, store) = service(&dir, generator, GenerationOptions::default());

        let err = service.generate(request("topic")).await.expect_err("no placeholders");
        assert!(matches!(err, GenerateError::Failed { .. }));
        assert!(store.load().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn timeout_creates_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let generator = Arc::new(Scripted {
            answer: Ok(ANSWER.to_string()),
            delay: Some(Duration::from_millis(200)),
            instructions: Mutex::new(Vec::new()),
        });
        let options = GenerationOptions {
            timeout: Duration::from_millis(20),
            ..GenerationOptions::default()
        };
        let (service, store) = service(&dir, generator, options);

        let err = service.generate(request("topic")).await.expect_err("timeout");
        assert!(matches!(
            err,
            GenerateError::Upstream(GenerationError::Timeout { .. })
        ));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn upstream_failure_creates_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let generator = Arc::new(Scripted {
            answer: Err(()),
            delay: None,
            instructions: Mutex::new(Vec::new()),
        });
        let (service, store) = service(&dir, generator, GenerationOptions::default());

        assert!(matches!(
            service.generate(request("topic")).await,
            Err(GenerateError::Upstream(GenerationError::Request(_)))
        ));
        assert!(!store.path().exists());
    }
}
