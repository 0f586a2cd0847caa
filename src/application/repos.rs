//! Traits describing the external collaborators of the content pipeline.

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::cache::PageKey;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation request failed: {0}")]
    Request(String),
    #[error("text generation returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("text generation response could not be decoded: {0}")]
    Decode(String),
    #[error("text generation timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl GenerationError {
    pub fn request(err: impl std::fmt::Display) -> Self {
        Self::Request(err.to_string())
    }
}

/// Opaque text-generation capability (LLM or any other backend).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, instruction: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{key}` is not addressable")]
    InvalidKey { key: String },
    #[error("object `{key}` already exists")]
    AlreadyExists { key: String },
    #[error("object `{key}` not found")]
    NotFound { key: String },
    #[error("object storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("object storage failure: {0}")]
    Backend(String),
}

/// A stored object read back for serving.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Durable image hosting.
///
/// `put` must not return before the object is durably written under `key`,
/// and a failed `put` must not leave a partial object behind.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError>;

    fn public_url(&self, key: &str) -> String;

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;
}

#[derive(Debug, Error)]
#[error("invalidation of {target} failed: {message}")]
pub struct InvalidationError {
    pub target: &'static str,
    pub message: String,
}

impl InvalidationError {
    pub fn new(target: &'static str, message: impl Into<String>) -> Self {
        Self {
            target,
            message: message.into(),
        }
    }
}

/// A downstream rendering target that caches pages derived from posts.
#[async_trait]
pub trait RenderInvalidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn invalidate(&self, pages: &[PageKey]) -> Result<(), InvalidationError>;
}

/// Source of the reference instant for visibility and scheduling.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for tests and offline tooling.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    pub fn advance(&self, by: Duration) {
        let next = self.now() + by;
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(datetime!(2026-10-18 09:00 UTC));
        clock.advance(Duration::days(1));
        assert_eq!(clock.now(), datetime!(2026-10-19 09:00 UTC));
    }
}
