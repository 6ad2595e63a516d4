//! Local directory uploader
//!
//! Copies files into a directory that is served statically and returns
//! `<base_url>/<file name>`. Used in development and tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::{AssetError, AssetUploader, Result, UploadedAsset};

pub struct LocalUploader {
    public_dir: PathBuf,
    base_url: String,
}

impl LocalUploader {
    pub fn new(public_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            public_dir: public_dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AssetUploader for LocalUploader {
    async fn upload(&self, path: &Path) -> Result<UploadedAsset> {
        if !tokio::fs::try_exists(path).await? {
            return Err(AssetError::MissingFile(path.to_path_buf()));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(crate::sanitize_file_name)
            .ok_or_else(|| AssetError::MissingFile(path.to_path_buf()))?;

        tokio::fs::create_dir_all(&self.public_dir).await?;
        let bytes = tokio::fs::copy(path, self.public_dir.join(&name)).await?;

        Ok(UploadedAsset {
            url: format!("{}/{}", self.base_url, name),
            public_id: name,
            bytes,
        })
    }
}
