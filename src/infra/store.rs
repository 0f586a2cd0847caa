//! File-backed post collection store.
//!
//! The whole collection lives in one JSON file. Every change goes through
//! [`PostStore::mutate`], which holds the store's writer lock across
//! read → modify → write, and every write lands via a same-directory
//! temporary file that is fsynced and renamed over the target.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::{fs, sync::Mutex, task};
use tracing::{debug, info, warn};

use crate::domain::entities::BlogPost;
use crate::domain::error::DomainError;
use crate::domain::posts::PostCollection;

const SOURCE: &str = "infra::store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("post store `{path}` is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("slug `{slug}` already exists")]
    DuplicateSlug { slug: String },
    #[error("post store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize post collection: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("post store writer task failed: {0}")]
    Writer(String),
}

/// Single source of truth for the post collection.
#[derive(Debug)]
pub struct PostStore {
    path: PathBuf,
    writer: Mutex<()>,
}

impl PostStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current snapshot. A missing file is an empty collection.
    ///
    /// Readers never take the writer lock; the rename-into-place write
    /// strategy guarantees they only ever see complete files.
    pub async fn load(&self) -> Result<PostCollection, StoreError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(target = SOURCE, path = %self.path.display(), "store file absent; empty collection");
                return Ok(PostCollection::new());
            }
            Err(err) => return Err(StoreError::Io(err)),
        };

        let posts: Vec<BlogPost> =
            serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        PostCollection::from_posts(posts).map_err(|err| match err {
            DomainError::DuplicateSlug { slug } => {
                warn!(target = SOURCE, path = %self.path.display(), slug = %slug, "store file holds duplicate slugs");
                StoreError::Corrupt {
                    path: self.path.clone(),
                    source: serde::de::Error::custom(format!("duplicate slug `{slug}`")),
                }
            }
            other => StoreError::Writer(other.to_string()),
        })
    }

    /// Replace the persisted snapshot wholesale.
    pub async fn save(&self, collection: &PostCollection) -> Result<(), StoreError> {
        let _guard = self.writer.lock().await;
        self.write_snapshot(collection).await
    }

    /// Serialized read-modify-write.
    ///
    /// `apply` edits a freshly loaded snapshot. If it returns `Err`, nothing
    /// is written. Otherwise timestamps are stamped on new and changed
    /// records, slug uniqueness is re-checked and the snapshot is persisted
    /// before the lock is released.
    pub async fn mutate<T, E, F>(&self, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut PostCollection) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.writer.lock().await;
        let started_at = Instant::now();

        let mut collection = self.load().await?;
        let before: HashMap<String, BlogPost> = collection
            .iter()
            .map(|post| (post.slug.clone(), post.clone()))
            .collect();

        let output = apply(&mut collection)?;

        stamp_timestamps(&mut collection, &before, OffsetDateTime::now_utc());
        if let Err(DomainError::DuplicateSlug { slug }) = collection.ensure_unique_slugs() {
            counter!("tsuzuri_store_conflict_total").increment(1);
            return Err(StoreError::DuplicateSlug { slug }.into());
        }

        self.write_snapshot(&collection).await?;

        counter!("tsuzuri_store_mutation_total").increment(1);
        info!(
            target = SOURCE,
            op = "mutate",
            posts = collection.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "post collection committed"
        );

        Ok(output)
    }

    async fn write_snapshot(&self, collection: &PostCollection) -> Result<(), StoreError> {
        if let Err(DomainError::DuplicateSlug { slug }) = collection.ensure_unique_slugs() {
            return Err(StoreError::DuplicateSlug { slug });
        }

        let mut payload = serde_json::to_vec_pretty(collection).map_err(StoreError::Serialize)?;
        payload.push(b'\n');

        let target = self.path.clone();
        task::spawn_blocking(move || write_atomically(&target, &payload))
            .await
            .map_err(|err| StoreError::Writer(err.to_string()))?
    }
}

fn write_atomically(target: &Path, payload: &[u8]) -> Result<(), StoreError> {
    let directory = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&directory)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".posts-")
        .suffix(".tmp")
        .tempfile_in(&directory)?;
    staged.write_all(payload)?;
    staged.as_file().sync_all()?;
    staged.persist(target).map_err(|err| StoreError::Io(err.error))?;

    // Make the rename itself durable where the platform allows it.
    if let Ok(handle) = std::fs::File::open(&directory) {
        let _ = handle.sync_all();
    }

    Ok(())
}

fn stamp_timestamps(
    collection: &mut PostCollection,
    before: &HashMap<String, BlogPost>,
    now: OffsetDateTime,
) {
    for post in collection.iter_mut() {
        match before.get(&post.slug) {
            None => {
                post.created_at = now;
                post.updated_at = now;
            }
            Some(previous) => {
                post.created_at = previous.created_at;
                if post != previous {
                    post.updated_at = now;
                }
            }
        }
    }
}
