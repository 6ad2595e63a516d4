//! Virzufurn Assets - Product image upload
//!
//! Incoming multipart files are staged on local disk as [`TempFile`]s and
//! handed to an [`AssetUploader`], which returns the public URL. The staged
//! copy is always removed afterwards, whether the upload succeeded or not.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use virzufurn_core::AssetConfig;

pub mod cloudinary;
pub mod local;

pub use cloudinary::CloudinaryUploader;
pub use local::LocalUploader;

/// Asset upload errors
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("File not found: {0}")]
    MissingFile(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid upload response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, AssetError>;

/// Result of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedAsset {
    /// Publicly reachable URL
    pub url: String,
    /// Identifier assigned by the storage backend
    pub public_id: String,
    pub bytes: u64,
}

/// Trait for object-storage backends
#[async_trait]
pub trait AssetUploader: Send + Sync {
    /// Upload the file at `path` and return where it can be fetched from
    async fn upload(&self, path: &Path) -> Result<UploadedAsset>;
}

/// Pick the uploader for a configuration: Cloudinary when credentials are
/// present, the local public directory otherwise.
pub fn uploader_from_config(config: &AssetConfig) -> Result<Arc<dyn AssetUploader>> {
    match config.cloudinary_credentials() {
        Some((cloud_name, api_key, api_secret)) => {
            let uploader = CloudinaryUploader::new(
                cloud_name,
                api_key,
                api_secret,
                Duration::from_secs(config.upload_timeout_secs),
            )?;
            Ok(Arc::new(uploader))
        }
        None => {
            tracing::warn!(
                dir = %config.public_dir.display(),
                "Cloudinary credentials not configured, storing uploads locally"
            );
            Ok(Arc::new(LocalUploader::new(
                config.public_dir.clone(),
                config.base_url.clone(),
            )))
        }
    }
}

/// A staged upload on local disk, removed when dropped
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Write `data` into `dir` under a unique name derived from `original_name`
    pub async fn persist(dir: &Path, original_name: &str, data: &[u8]) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let name = format!("{}-{}", uuid::Uuid::new_v4(), sanitize_file_name(original_name));
        let path = dir.join(name);
        tokio::fs::write(&path, data).await?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp file");
            }
        }
    }
}

/// Upload a staged file, then remove it regardless of the outcome
pub async fn upload_and_cleanup(
    uploader: &dyn AssetUploader,
    file: TempFile,
) -> Result<UploadedAsset> {
    let result = uploader.upload(file.path()).await;
    drop(file);

    match &result {
        Ok(asset) => tracing::debug!(url = %asset.url, bytes = asset.bytes, "Asset uploaded"),
        Err(e) => tracing::error!(error = %e, "Asset upload failed"),
    }
    result
}

/// Keep only characters that are safe in a file name and a URL path segment
pub(crate) fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingUploader;

    #[async_trait]
    impl AssetUploader for FailingUploader {
        async fn upload(&self, path: &Path) -> Result<UploadedAsset> {
            assert!(path.exists());
            Err(AssetError::Rejected {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("chair.png"), "chair.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name(".."), "upload");
    }

    #[tokio::test]
    async fn test_temp_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = TempFile::persist(dir.path(), "a.png", b"png").await.unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());

        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_failed_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = TempFile::persist(dir.path(), "a.png", b"png").await.unwrap();
        let path = file.path().to_path_buf();

        let result = upload_and_cleanup(&FailingUploader, file).await;
        assert!(matches!(result, Err(AssetError::Rejected { status: 500, .. })));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_successful_upload() {
        let staging = tempfile::tempdir().unwrap();
        let public = tempfile::tempdir().unwrap();
        let uploader = LocalUploader::new(public.path(), "http://cdn.test/uploads");

        let file = TempFile::persist(staging.path(), "lamp.png", b"lamp")
            .await
            .unwrap();
        let path = file.path().to_path_buf();

        let asset = upload_and_cleanup(&uploader, file).await.unwrap();
        assert!(asset.url.starts_with("http://cdn.test/uploads/"));
        assert_eq!(asset.bytes, 4);
        assert!(!path.exists());
    }

    #[test]
    fn test_uploader_from_config_falls_back_to_local() {
        let config = AssetConfig::default();
        assert!(uploader_from_config(&config).is_ok());
    }
}
