//! Shared fakes and builders for the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use time::{OffsetDateTime, UtcOffset, macros::datetime};

use tsuzuri::application::generation::{GenerationOptions, GenerationService};
use tsuzuri::application::posts::PostService;
use tsuzuri::application::repos::{
    Clock, GenerationError, InvalidationError, ManualClock, ObjectStorage, RenderInvalidator,
    StorageError, StoredObject, TextGenerator,
};
use tsuzuri::application::uploads::ImageIngestService;
use tsuzuri::cache::{InvalidationNotifier, PageKey};
use tsuzuri::infra::store::PostStore;

pub const START: OffsetDateTime = datetime!(2026-10-18 10:00 UTC);
pub const AUTHOR: &str = "Editorial Team";

/// Answers generation requests from a queue of canned responses.
#[derive(Default)]
pub struct ScriptedGenerator {
    answers: Mutex<VecDeque<Result<String, GenerationError>>>,
}

impl ScriptedGenerator {
    pub fn answering(answers: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _instruction: &str) -> Result<String, GenerationError> {
        self.answers
            .lock()
            .expect("answers lock")
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::request("no scripted answer left")))
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .expect("objects lock")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        let mut objects = self.objects.lock().expect("objects lock");
        if objects.contains_key(key) {
            return Err(StorageError::AlreadyExists {
                key: key.to_string(),
            });
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.example.com/media/{key}")
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        self.objects
            .lock()
            .expect("objects lock")
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }
}

/// Remembers every invalidation batch it receives.
#[derive(Default)]
pub struct RecordingInvalidator {
    calls: Mutex<Vec<Vec<PageKey>>>,
}

impl RecordingInvalidator {
    pub fn calls(&self) -> Vec<Vec<PageKey>> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl RenderInvalidator for RecordingInvalidator {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn invalidate(&self, pages: &[PageKey]) -> Result<(), InvalidationError> {
        self.calls.lock().expect("calls lock").push(pages.to_vec());
        Ok(())
    }
}

/// Everything a pipeline test needs, wired against one store file.
pub struct Pipeline {
    pub store: Arc<PostStore>,
    pub clock: Arc<ManualClock>,
    pub invalidations: Arc<RecordingInvalidator>,
    pub storage: Arc<MemoryStorage>,
    pub posts: PostService,
    pub generation: GenerationService,
    pub uploads: ImageIngestService,
}

impl Pipeline {
    pub fn new(dir: &Path, generator: ScriptedGenerator) -> Self {
        let store = Arc::new(PostStore::new(dir.join("posts.json")));
        let clock = Arc::new(ManualClock::new(START));
        let invalidations = Arc::new(RecordingInvalidator::default());
        let storage = Arc::new(MemoryStorage::default());
        let notifier = InvalidationNotifier::default().with_target(invalidations.clone());
        let clock_handle: Arc<dyn Clock> = clock.clone();

        let posts = PostService::new(
            store.clone(),
            notifier.clone(),
            clock_handle,
            UtcOffset::UTC,
            AUTHOR,
        );
        let generation = GenerationService::new(
            Arc::new(generator),
            store.clone(),
            notifier,
            GenerationOptions::default(),
        );
        let uploads = ImageIngestService::new(storage.clone(), 1024 * 1024);

        Self {
            store,
            clock,
            invalidations,
            storage,
            posts,
            generation,
            uploads,
        }
    }
}

/// A generator answer in the fenced JSON shape the instruction asks for.
pub fn article_answer(title: &str, content: &str) -> String {
    let body = serde_json::json!({
        "title": title,
        "description": "A practical walkthrough.",
        "content": content,
        "tags": ["setup", "lighting"],
        "keywords": ["desk", "lamp"],
        "readTime": "6分",
    });
    format!("Here you go:\n```json\n{body}\n```\n")
}

pub const FOUR_PLACEHOLDER_ARTICLE: &str = "Intro paragraph.\n\n[IMAGE_HERO]\n\n## One\n\n[IMAGE_1]\n\n## Two\n\n[IMAGE_2]\n\n## Three\n\n[IMAGE_3]\n\nOutro.";
