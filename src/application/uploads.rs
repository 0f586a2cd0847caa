//! Image ingestion: validate an upload, persist it, return its public URL.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use tsuzuri_api_types::UploadResponse;
use uuid::Uuid;

use crate::application::repos::{ObjectStorage, StorageError};

const SOURCE: &str = "application::uploads";
const KEY_PREFIX: &str = "blog";
/// Image types that browsers execute scripts in when opened directly.
const SCRIPTABLE_IMAGE_TYPES: &[&str] = &["image/svg+xml"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid media: {reason}")]
    InvalidMedia { reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IngestError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidMedia {
            reason: reason.into(),
        }
    }
}

/// A durably stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedImage {
    pub key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub checksum: String,
}

impl From<IngestedImage> for UploadResponse {
    fn from(image: IngestedImage) -> Self {
        Self {
            key: image.key,
            url: image.url,
            content_type: image.content_type,
            size_bytes: image.size_bytes,
            checksum: image.checksum,
        }
    }
}

#[derive(Clone)]
pub struct ImageIngestService {
    storage: Arc<dyn ObjectStorage>,
    max_bytes: u64,
}

impl ImageIngestService {
    pub fn new(storage: Arc<dyn ObjectStorage>, max_bytes: u64) -> Self {
        Self { storage, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Validate and store one image. The returned URL is only handed out
    /// after the storage backend has durably written the object.
    pub async fn ingest(
        &self,
        original_name: Option<&str>,
        declared_mime: Option<&str>,
        data: Bytes,
    ) -> Result<IngestedImage, IngestError> {
        let content_type = normalize_mime(declared_mime)
            .or_else(|| {
                original_name
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|mime| mime.essence_str().to_string())
            })
            .ok_or_else(|| IngestError::invalid("missing content type"))?;

        if !content_type.starts_with("image/")
            || SCRIPTABLE_IMAGE_TYPES.contains(&content_type.as_str())
        {
            counter!("tsuzuri_upload_rejected_total").increment(1);
            return Err(IngestError::invalid(format!(
                "`{content_type}` is not an accepted image type"
            )));
        }
        if data.is_empty() {
            counter!("tsuzuri_upload_rejected_total").increment(1);
            return Err(IngestError::invalid("payload is empty"));
        }
        let size_bytes = data.len() as u64;
        if size_bytes > self.max_bytes {
            counter!("tsuzuri_upload_rejected_total").increment(1);
            return Err(IngestError::invalid(format!(
                "payload of {size_bytes} bytes exceeds the {} byte limit",
                self.max_bytes
            )));
        }

        let extension = extension_for(original_name, &content_type);
        let key = build_key(OffsetDateTime::now_utc(), Uuid::new_v4(), &extension);
        let checksum = hex::encode(Sha256::digest(&data[..]).as_slice());

        self.storage.put(&key, &content_type, data).await?;
        let url = self.storage.public_url(&key);

        counter!("tsuzuri_upload_total").increment(1);
        info!(
            target = SOURCE,
            key = %key,
            content_type = %content_type,
            size_bytes,
            "image stored"
        );

        Ok(IngestedImage {
            key,
            url,
            content_type,
            size_bytes,
            checksum,
        })
    }
}

fn normalize_mime(declared: Option<&str>) -> Option<String> {
    let essence = declared?.split(';').next()?.trim().to_ascii_lowercase();
    (!essence.is_empty() && essence != "application/octet-stream").then_some(essence)
}

/// Pick the stored extension. A client-supplied name only contributes its
/// extension when that extension maps back to the validated content type.
fn extension_for(original_name: Option<&str>, content_type: &str) -> String {
    let from_name = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.trim_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
        .filter(|ext| {
            mime_guess::from_ext(ext)
                .iter()
                .any(|mime| mime.essence_str() == content_type)
        });

    from_name
        .or_else(|| {
            mime_guess::get_mime_extensions_str(content_type)
                .and_then(|extensions| extensions.first())
                .map(|ext| (*ext).to_string())
        })
        .unwrap_or_else(|| "bin".to_string())
}

/// `blog-{unix_millis}-{uuid}.{ext}`
fn build_key(now: OffsetDateTime, id: Uuid, extension: &str) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{KEY_PREFIX}-{millis}-{}.{extension}", id.simple())
}
