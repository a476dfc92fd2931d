//! Object Storage
//!
//! The `ObjectStore` trait abstracts the storage collaborator. Callers never
//! talk to a store directly: writes go through `StorageFallbackWriter`, which
//! owns retries, object naming and the inline fallback.
//!
//! ## Adapters
//!
//! - `HttpObjectStore`: bucket REST API over HTTP
//! - `LocalDirStore`: filesystem directory with `file://` references
//! - `UnconfiguredStore`: always fails, so every write degrades to inline

pub mod fallback;
pub mod fetch;
mod http;
mod local;

pub use fallback::{StorageFallbackWriter, StoredRef, WriteMeta, inline_reference, is_inline};
pub use fetch::{DefaultFetcher, SharedFetcher, SourceFetcher, decode_data_uri};
pub use http::HttpObjectStore;
pub use local::LocalDirStore;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::auth::Credential;
use crate::config::{StorageBackend, StorageConfig};
use crate::types::{FlowError, Result};

/// Options for a single object write
#[derive(Debug, Clone)]
pub struct PutOptions {
    /// Object should be readable through a public URL
    pub public: bool,
    pub content_type: String,
}

/// Location of a durably stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
}

/// Storage collaborator
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Adapter name for logs
    fn name(&self) -> &str;

    /// Write `bytes` under `name`, returning the object's URL
    async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        options: &PutOptions,
        credential: &Credential,
    ) -> Result<StoredObject>;

    /// Delete the object previously returned as `url`
    async fn delete(&self, url: &str, credential: &Credential) -> Result<()>;
}

pub type SharedStore = Arc<dyn ObjectStore>;

/// Store used when no backend is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredStore;

#[async_trait]
impl ObjectStore for UnconfiguredStore {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn put(
        &self,
        _name: &str,
        _bytes: &[u8],
        _options: &PutOptions,
        _credential: &Credential,
    ) -> Result<StoredObject> {
        Err(FlowError::Config("object storage is not configured".to_string()))
    }

    async fn delete(&self, _url: &str, _credential: &Credential) -> Result<()> {
        Err(FlowError::Config("object storage is not configured".to_string()))
    }
}

/// Build the store selected by configuration
pub fn build_store(config: &StorageConfig, client_timeout_secs: u64) -> Result<SharedStore> {
    let store: SharedStore = match config.backend {
        StorageBackend::None => Arc::new(UnconfiguredStore),
        StorageBackend::Local => Arc::new(LocalDirStore::new(&config.local_dir)?),
        StorageBackend::Http => Arc::new(HttpObjectStore::from_config(config, client_timeout_secs)?),
    };
    Ok(store)
}

/// Guess a MIME type from a file extension
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}

/// File extension used when naming an object of `content_type`
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        "image/avif" => "avif",
        _ => "bin",
    }
}
