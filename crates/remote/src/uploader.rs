//! Binary asset uploader.
//!
//! Uploads one blob per call to the asset storage service and derives the
//! thumbnail/optimized delivery URLs from the canonical secure URL. The call
//! is at-least-once: identical content uploaded twice yields two assets, and
//! dedup (if wanted) is the caller's responsibility.

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

use skyspot_core::errors::SyncError;
use skyspot_core::sync::{AssetUploaderTrait, UploadResult};

use crate::config::RemoteConfig;
use crate::error::{RemoteError, Result};

const THUMBNAIL_TRANSFORMATION: &str = "c_thumb,w_200,h_200";
const OPTIMIZED_TRANSFORMATION: &str = "q_auto,f_auto,w_1200";

/// Response shape of the asset storage service.
#[derive(Debug, Deserialize)]
struct AssetUploadResponse {
    public_id: String,
    url: String,
    secure_url: String,
    width: u32,
    height: u32,
    format: String,
}

/// Insert a delivery transformation into an asset URL. Returns the URL
/// unchanged when it does not follow the `/upload/` convention.
fn with_transformation(url: &str, transformation: &str) -> String {
    match url.find("/upload/") {
        Some(idx) => {
            let (head, tail) = url.split_at(idx + "/upload/".len());
            format!("{}{}/{}", head, transformation, tail)
        }
        None => url.to_string(),
    }
}

/// Uploader for the binary asset storage service.
#[derive(Debug, Clone)]
pub struct AssetUploader {
    client: reqwest::Client,
    upload_url: String,
    upload_preset: String,
    max_asset_bytes: usize,
}

impl AssetUploader {
    pub fn new(config: &RemoteConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            upload_url: config.asset_upload_url.clone(),
            upload_preset: config.asset_upload_preset.clone(),
            max_asset_bytes: config.max_asset_bytes,
        }
    }

    async fn upload_impl(&self, bytes: Vec<u8>, owner_hint: &str) -> Result<UploadResult> {
        debug!(
            "Uploading {} byte(s) for owner {}",
            bytes.len(),
            owner_hint
        );

        let form = Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", owner_hint.to_string())
            .part("file", Part::bytes(bytes).file_name("asset"));

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::api(status.as_u16(), body));
        }

        let uploaded: AssetUploadResponse = serde_json::from_str(&body)?;
        Ok(UploadResult {
            thumbnail_url: with_transformation(&uploaded.secure_url, THUMBNAIL_TRANSFORMATION),
            optimized_url: with_transformation(&uploaded.secure_url, OPTIMIZED_TRANSFORMATION),
            id: uploaded.public_id,
            url: uploaded.url,
            secure_url: uploaded.secure_url,
            width: uploaded.width,
            height: uploaded.height,
            format: uploaded.format,
        })
    }
}

#[async_trait]
impl AssetUploaderTrait for AssetUploader {
    async fn upload(&self, bytes: Vec<u8>, owner_hint: &str) -> skyspot_core::Result<UploadResult> {
        if bytes.is_empty() {
            return Err(SyncError::AssetUnreadable("empty asset bytes".to_string()).into());
        }
        if bytes.len() > self.max_asset_bytes {
            return Err(SyncError::AssetTooLarge {
                size: bytes.len(),
                limit: self.max_asset_bytes,
            }
            .into());
        }
        Ok(self.upload_impl(bytes, owner_hint).await?)
    }
}
