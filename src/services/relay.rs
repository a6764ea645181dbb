use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, info};

use crate::config::CloudinaryConfig;
use crate::types::UploadedFile;

/// Folder profile pictures are stored under.
pub const PROFILE_FOLDER: &str = "profile-pictures";
/// Folder schedule images are stored under.
pub const SCHEDULE_FOLDER: &str = "schedules";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Upload relay timed out after {0} ms")]
    Timeout(u64),

    #[error("Upload relay request failed: {0}")]
    Transport(String),

    #[error("Upload relay rejected the file ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Image hosting that turns uploaded bytes into a public URL.
#[async_trait]
pub trait UploadRelay: Send + Sync {
    async fn upload(&self, folder: &str, file: &UploadedFile) -> Result<String, RelayError>;
}

/// Signed uploads to the Cloudinary image API.
pub struct CloudinaryRelay {
    client: Client,
    upload_url: String,
    api_key: String,
    api_secret: String,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryRelay {
    pub fn new(config: &CloudinaryConfig, timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            upload_url: format!(
                "{}/{}/image/upload",
                config.base_url.trim_end_matches('/'),
                config.cloud_name
            ),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> RelayError {
        if err.is_timeout() {
            RelayError::Timeout(self.timeout_ms)
        } else {
            error!("upload relay request failed: {}", err);
            RelayError::Transport(err.to_string())
        }
    }
}

/// Signature over the signed parameters, sorted by name, followed by the secret.
fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{:x}", Sha256::digest(format!("{}{}", joined, api_secret).as_bytes()))
}

#[async_trait]
impl UploadRelay for CloudinaryRelay {
    async fn upload(&self, folder: &str, file: &UploadedFile) -> Result<String, RelayError> {
        let now = Utc::now();
        let timestamp = now.timestamp().to_string();
        let public_id = format!("{}-{}", file.stem(), now.timestamp_millis());
        let signature = sign(
            &[("folder", folder), ("public_id", &public_id), ("timestamp", &timestamp)],
            &self.api_secret,
        );

        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("public_id", public_id)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("upload relay rejected {}: {} {}", file.file_name, status, message);
            return Err(RelayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| self.transport_error(e))?;
        info!("uploaded {} ({} bytes) to {}", file.file_name, file.bytes.len(), folder);
        Ok(uploaded.secure_url)
    }
}

/// Relay that never leaves the process, returning predictable URLs.
#[derive(Clone, Default)]
pub struct MemoryRelay {
    uploads: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Make every following upload fail, as an unreachable relay would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl UploadRelay for MemoryRelay {
    async fn upload(&self, folder: &str, file: &UploadedFile) -> Result<String, RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::Transport("relay unavailable".to_string()));
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://images.invalid/{}/{}-{}", folder, file.stem(), n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn png(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: Bytes::from_static(b"\x89PNG"),
        }
    }

    #[test]
    fn signature_is_order_independent() {
        let a = sign(&[("timestamp", "1"), ("folder", "f"), ("public_id", "p")], "s3cret");
        let b = sign(&[("folder", "f"), ("public_id", "p"), ("timestamp", "1")], "s3cret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sign(&[("folder", "f"), ("public_id", "p"), ("timestamp", "1")], "other"));
    }

    #[tokio::test]
    async fn memory_relay_counts_and_fails_on_demand() {
        let relay = MemoryRelay::new();
        let url = relay.upload(PROFILE_FOLDER, &png("me.png")).await.unwrap();
        assert_eq!(url, "https://images.invalid/profile-pictures/me-1");

        relay.set_failing(true);
        assert!(relay.upload(SCHEDULE_FOLDER, &png("x.png")).await.is_err());
        assert_eq!(relay.upload_count(), 1);
    }
}
