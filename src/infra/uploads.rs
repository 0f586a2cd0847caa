//! Filesystem-backed object storage for uploaded images.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{fs, task};
use url::Url;

use crate::application::repos::{ObjectStorage, StorageError, StoredObject};

/// Stores objects as files under `root` and serves them below `public_base`.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
    public_base: Url,
}

impl FilesystemStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf, public_base: Url) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, public_base })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the absolute filesystem path for a stored object.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let flat = relative.components().count() == 1
            && matches!(relative.components().next(), Some(Component::Normal(_)));
        if key.is_empty() || relative.is_absolute() || !flat {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for FilesystemStorage {
    async fn put(&self, key: &str, _content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        let target = self.resolve(key)?;
        let root = self.root.clone();
        let key = key.to_string();

        task::spawn_blocking(move || {
            std::fs::create_dir_all(&root)?;
            let mut staged = tempfile::Builder::new()
                .prefix(".upload-")
                .tempfile_in(&root)?;
            staged.write_all(&bytes)?;
            staged.as_file().sync_all()?;
            staged.persist_noclobber(&target).map_err(|err| {
                if err.error.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::AlreadyExists { key }
                } else {
                    StorageError::Io(err.error)
                }
            })?;
            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|err| StorageError::Backend(err.to_string()))?
    }

    fn public_url(&self, key: &str) -> String {
        match self.public_base.join(key) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}/{key}", self.public_base.as_str().trim_end_matches('/')),
        }
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let path = self.resolve(key)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    key: key.to_string(),
                });
            }
            Err(err) => return Err(StorageError::Io(err)),
        };
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(StoredObject {
            content_type,
            bytes: Bytes::from(data),
        })
    }
}
