//! Cloudinary uploader
//!
//! Signed multipart upload to `https://api.cloudinary.com/v1_1/{cloud}/auto/upload`.
//! The signature is SHA-256 over the sorted signed parameters followed by the
//! API secret. Every form field except `file`, `api_key` and `signature` is
//! signed, so the account must be configured for SHA-256 signatures.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

use crate::{AssetError, AssetUploader, Result, UploadedAsset};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Cloudinary upload API client
pub struct CloudinaryUploader {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
    public_id: String,
    #[serde(default)]
    bytes: u64,
}

impl CloudinaryUploader {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/{}/auto/upload", self.cloud_name)
    }
}

/// Parameters sent alongside the file that take part in the signature
fn signed_params(timestamp: i64) -> Vec<(&'static str, String)> {
    vec![("timestamp", timestamp.to_string())]
}

/// Hex SHA-256 of `k1=v1&k2=v2<secret>` with keys sorted
fn sign(params: &[(&'static str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let digest = Sha256::digest(format!("{joined}{api_secret}").as_bytes());
    format!("{digest:x}")
}

#[async_trait]
impl AssetUploader for CloudinaryUploader {
    async fn upload(&self, path: &Path) -> Result<UploadedAsset> {
        if !tokio::fs::try_exists(path).await? {
            return Err(AssetError::MissingFile(path.to_path_buf()));
        }

        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let params = signed_params(chrono::Utc::now().timestamp());
        let signature = sign(&params, &self.api_secret);

        let mut form = Form::new().text("api_key", self.api_key.clone());
        for (key, value) in params {
            form = form.text(key, value);
        }
        let form = form
            .text("signature", signature)
            .part("file", Part::bytes(data).file_name(file_name));

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssetError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let result: UploadResponse = response
            .json()
            .await
            .map_err(|e| AssetError::InvalidResponse(e.to_string()))?;

        let url = result
            .secure_url
            .or(result.url)
            .ok_or_else(|| AssetError::InvalidResponse("missing url".to_string()))?;

        tracing::info!(public_id = %result.public_id, "Uploaded asset to Cloudinary");

        Ok(UploadedAsset {
            url,
            public_id: result.public_id,
            bytes: result.bytes,
        })
    }
}
