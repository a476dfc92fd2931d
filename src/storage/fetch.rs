//! Source Fetching
//!
//! Resolves a source reference to bytes. Accepted forms:
//! - `data:<mime>;base64,<payload>` (inline references from degraded writes)
//! - `http://` / `https://` URLs (committed storage objects)
//! - `file://` URLs and bare filesystem paths

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::mime_for_path;
use crate::constants::network;
use crate::types::{ErrorClassifier, FlowError, RawAsset, Result};

const SERVICE: &str = "fetch";
const FALLBACK_MIME: &str = "application/octet-stream";

/// Source bytes collaborator
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<RawAsset>;
}

pub type SharedFetcher = Arc<dyn SourceFetcher>;

/// Decode an inline `data:` reference into (mime, bytes)
pub fn decode_data_uri(reference: &str) -> Result<(String, Vec<u8>)> {
    let invalid = |message: &str| FlowError::validation("source", format!("{}: {}", message, truncate(reference)));

    let body = reference
        .strip_prefix("data:")
        .ok_or_else(|| invalid("not a data URI"))?;
    let (header, payload) = body
        .split_once(',')
        .ok_or_else(|| invalid("data URI has no payload"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| invalid("only base64 data URIs are supported"))?;

    let bytes = BASE64
        .decode(payload.trim().as_bytes())
        .map_err(|e| invalid(&format!("invalid base64 ({})", e)))?;

    let mime = if mime.is_empty() { FALLBACK_MIME } else { mime };
    Ok((mime.to_string(), bytes))
}

fn truncate(reference: &str) -> String {
    reference.chars().take(64).collect()
}

/// Fetcher for data URIs, HTTP(S) URLs and local files
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    client: reqwest::Client,
}

impl DefaultFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(network::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| FlowError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &Url) -> Result<RawAsset> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, SERVICE))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(status.as_u16(), &body, SERVICE).into());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .or_else(|| mime_for_path(Path::new(url.path())).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, SERVICE))?;

        Ok(RawAsset::new(url.as_str(), bytes.to_vec(), content_type))
    }

    async fn fetch_file(&self, path: &Path, handle: &str) -> Result<RawAsset> {
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                FlowError::validation("source", format!("file not found: {}", path.display()))
            }
            _ => FlowError::Io(e),
        })?;
        let content_type = mime_for_path(path).unwrap_or(FALLBACK_MIME);
        Ok(RawAsset::new(handle, bytes, content_type))
    }
}

#[async_trait]
impl SourceFetcher for DefaultFetcher {
    async fn fetch(&self, reference: &str) -> Result<RawAsset> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(FlowError::validation("source", "empty source reference"));
        }

        let asset = if reference.starts_with("data:") {
            let (mime, bytes) = decode_data_uri(reference)?;
            RawAsset::new("inline", bytes, mime)
        } else if let Ok(url) = Url::parse(reference)
            && matches!(url.scheme(), "http" | "https" | "file")
        {
            if url.scheme() == "file" {
                let path = url
                    .to_file_path()
                    .map_err(|_| FlowError::validation("source", format!("bad file URL: {}", reference)))?;
                self.fetch_file(&path, reference).await?
            } else {
                self.fetch_http(&url).await?
            }
        } else {
            self.fetch_file(Path::new(reference), reference).await?
        };

        if asset.bytes.is_empty() {
            return Err(FlowError::validation(
                "source",
                format!("source is empty: {}", truncate(reference)),
            ));
        }

        debug!(
            source = %truncate(reference),
            size = asset.bytes.len(),
            content_type = %asset.content_type,
            "Fetched source"
        );
        Ok(asset)
    }
}
