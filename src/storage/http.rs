//! HTTP Object Store
//!
//! Bucket REST API: `POST {endpoint}/object/{bucket}/{name}` to write,
//! `DELETE` on the same path to remove. Public objects are served from
//! `{public_base_url}/{name}`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{ObjectStore, PutOptions, StoredObject};
use crate::auth::Credential;
use crate::config::StorageConfig;
use crate::constants::network;
use crate::types::{ErrorClassifier, FlowError, Result};

const SERVICE: &str = "storage";

pub struct HttpObjectStore {
    endpoint: String,
    bucket: String,
    public_base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpObjectStore")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl HttpObjectStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        public_base_url: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        url::Url::parse(&endpoint).map_err(|e| {
            FlowError::Config(format!("Invalid storage endpoint '{}': {}", endpoint, e))
        })?;

        let bucket = bucket.into();
        let public_base_url = public_base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("{}/object/public/{}", endpoint, bucket));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(network::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| FlowError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            bucket,
            public_base_url,
            client,
        })
    }

    pub fn from_config(config: &StorageConfig, timeout_secs: u64) -> Result<Self> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            FlowError::Config("storage.endpoint is required for the http backend".to_string())
        })?;
        Self::new(
            endpoint,
            config.bucket.clone(),
            config.public_base_url.clone(),
            timeout_secs,
        )
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/object/{}/{}", self.endpoint, self.bucket, name)
    }

    /// Recover the object name from a public URL this store returned
    fn object_name<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.public_base_url)?
            .strip_prefix('/')
            .filter(|name| !name.is_empty())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ErrorClassifier::classify_http_status(status.as_u16(), &body, SERVICE).into())
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        options: &PutOptions,
        credential: &Credential,
    ) -> Result<StoredObject> {
        debug!(bucket = %self.bucket, name, size = bytes.len(), "Uploading object");

        let response = self
            .client
            .post(self.object_url(name))
            .header("Authorization", credential.header_value())
            .header("Content-Type", &options.content_type)
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, SERVICE))?;

        Self::check(response).await?;

        let url = if options.public {
            format!("{}/{}", self.public_base_url, name)
        } else {
            self.object_url(name)
        };
        Ok(StoredObject { url })
    }

    async fn delete(&self, url: &str, credential: &Credential) -> Result<()> {
        let name = self
            .object_name(url)
            .or_else(|| url.strip_prefix(&format!("{}/object/{}/", self.endpoint, self.bucket)))
            .ok_or_else(|| FlowError::validation("url", format!("not an object of this store: {}", url)))?;

        let response = self
            .client
            .delete(self.object_url(name))
            .header("Authorization", credential.header_value())
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, SERVICE))?;

        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpObjectStore {
        HttpObjectStore::new("https://storage.test/v1/", "item-images", None, 10).unwrap()
    }

    #[test]
    fn test_default_public_base_url() {
        let store = store();
        assert_eq!(
            store.public_base_url,
            "https://storage.test/v1/object/public/item-images"
        );
        assert_eq!(
            store.object_url("uploads/a.png"),
            "https://storage.test/v1/object/item-images/uploads/a.png"
        );
    }

    #[test]
    fn test_object_name_from_public_url() {
        let store = store();
        assert_eq!(
            store.object_name("https://storage.test/v1/object/public/item-images/uploads/a.png"),
            Some("uploads/a.png")
        );
        assert_eq!(store.object_name("https://elsewhere.test/a.png"), None);
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = HttpObjectStore::new("not a url", "bucket", None, 10);
        assert!(matches!(result, Err(FlowError::Config(_))));
    }

    #[tokio::test]
    async fn test_delete_foreign_url_is_validation_error() {
        let cred = Credential::bearer("t").unwrap();
        let result = store().delete("https://elsewhere.test/a.png", &cred).await;
        assert!(matches!(result, Err(FlowError::Validation(_))));
    }
}
