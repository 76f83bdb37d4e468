//! Filesystem storage for uploaded avatars and the helpers that serve them back.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::info;

use crate::application::accounts::{AvatarStore, AvatarStoreError, AvatarUpload};

const AVATAR_DIRECTORY: &str = "avatars";

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

/// Result of storing an upload payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Path relative to the storage root, always `/`-separated.
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: u64,
}

/// Filesystem-backed upload storage.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
    public_prefix: String,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf, public_prefix: impl Into<String>) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_prefix: public_prefix.into(),
        })
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Store `data` under `directory`, naming the file after its SHA-256 digest.
    ///
    /// Identical payloads land on the same file, so re-uploads are idempotent.
    pub async fn store(
        &self,
        directory: &str,
        original_name: Option<&str>,
        data: &Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let checksum = hex::encode(Sha256::digest(data));
        let filename = match original_name.and_then(file_extension) {
            Some(ext) => format!("{checksum}.{ext}"),
            None => checksum.clone(),
        };
        let stored_path = format!("{directory}/{filename}");
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(StoredUpload {
            stored_path,
            checksum,
            size_bytes: data.len() as u64,
        })
    }

    /// Attempt to read the stored payload into memory.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Public relative URL under which a stored path is served.
    pub fn public_url(&self, stored_path: &str) -> String {
        format!("{}/{stored_path}", self.public_prefix)
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AvatarStore for UploadStorage {
    async fn store_avatar(&self, upload: AvatarUpload) -> Result<String, AvatarStoreError> {
        let stored = self
            .store(AVATAR_DIRECTORY, upload.filename.as_deref(), &upload.bytes)
            .await
            .map_err(|err| AvatarStoreError(err.to_string()))?;

        info!(
            target = "scrivo::infra::uploads",
            stored_path = %stored.stored_path,
            size_bytes = stored.size_bytes,
            "Stored avatar upload"
        );

        Ok(self.public_url(&stored.stored_path))
    }
}

fn file_extension(original: &str) -> Option<String> {
    Path::new(original)
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()))
}
