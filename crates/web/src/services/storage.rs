//! Product image storage on the local filesystem.
//!
//! Uploads are written in two phases. [`ImageStorage::stage`] writes the
//! bytes under `<root>/.staging/` and decides the final relative path; the
//! caller records that path in the database and then calls
//! [`ImageStorage::promote`] after commit, or [`ImageStorage::discard`] if
//! anything failed first.

use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;

/// Folder (relative to the upload root) holding product images.
pub const PRODUCT_IMAGE_FOLDER: &str = "prod_image";

const STAGING_DIR: &str = ".staging";
const STORED_NAME_LEN: usize = 40;
const MAX_EXTENSION_LEN: usize = 8;

/// Errors from image storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),
}

/// A file written to the staging area, not yet visible at its final path.
#[derive(Debug)]
#[must_use = "a staged image must be promoted or discarded"]
pub struct StagedImage {
    staged_path: PathBuf,
    final_relative_path: String,
}

impl StagedImage {
    /// Path the file will have relative to the upload root once promoted.
    #[must_use]
    pub fn final_relative_path(&self) -> &str {
        &self.final_relative_path
    }

    #[must_use]
    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }
}

/// Image storage rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` into the staging area.
    ///
    /// The stored name is 40 random alphanumeric characters followed by the
    /// extension of `original_name`, lowercased.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidUpload` for an empty file or bad folder,
    /// `StorageError::Io` if the file cannot be written.
    pub async fn stage(
        &self,
        folder: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StagedImage, StorageError> {
        validate_folder(folder)?;
        if bytes.is_empty() {
            return Err(StorageError::InvalidUpload("empty file".to_string()));
        }

        let stored_name = match extension_of(original_name) {
            Some(ext) => format!("{}.{ext}", random_name()),
            None => random_name(),
        };

        let staging_dir = self.root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging_dir).await?;

        let staged_path = staging_dir.join(&stored_name);
        tokio::fs::write(&staged_path, bytes).await?;

        tracing::debug!(path = %staged_path.display(), size = bytes.len(), "Staged upload");

        Ok(StagedImage {
            staged_path,
            final_relative_path: format!("{folder}/{stored_name}"),
        })
    }

    /// Move a staged file to its final location.
    ///
    /// # Returns
    ///
    /// Returns the absolute path of the promoted file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the target directory cannot be created
    /// or the rename fails. The staged file is left in place on failure.
    pub async fn promote(&self, staged: StagedImage) -> Result<PathBuf, StorageError> {
        let target = self.root.join(&staged.final_relative_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&staged.staged_path, &target).await?;
        Ok(target)
    }

    /// Remove a staged file. A file that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the file exists but cannot be removed.
    pub async fn discard(&self, staged: StagedImage) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&staged.staged_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn random_name() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STORED_NAME_LEN)
        .map(char::from)
        .collect()
}

/// Extension of an uploaded file name, if it is short and alphanumeric.
fn extension_of(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn validate_folder(folder: &str) -> Result<(), StorageError> {
    let valid = !folder.is_empty()
        && folder != STAGING_DIR
        && folder
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidUpload(format!(
            "invalid storage folder {folder:?}"
        )))
    }
}
