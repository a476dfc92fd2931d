//! Storage Fallback Writer
//!
//! Durable object writes under a fast-fail retry policy. When the durable
//! path fails for any reason, `write` degrades to an inline `data:` payload
//! so callers always get a usable reference.
//!
//! Every attempt writes under a fresh object name. An attempt that timed out
//! locally may still land remotely and leave an orphaned object behind.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ObjectStore, PutOptions, SharedStore, extension_for};
use crate::auth::Credential;
use crate::resilience::{ResilientInvoker, RetryPolicy, with_timeout};
use crate::types::Result;

/// Metadata for one write
#[derive(Debug, Clone)]
pub struct WriteMeta {
    pub content_type: String,
    /// Object name prefix, e.g. `studio/<item>` or `uploads`
    pub prefix: String,
    pub public: bool,
}

impl WriteMeta {
    pub fn new(content_type: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            prefix: prefix.into(),
            public: true,
        }
    }
}

/// Reference to written bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRef {
    /// Durable URL, or an inline `data:` URI when degraded
    pub reference: String,
    pub degraded: bool,
}

/// Inline `data:<mime>;base64,...` reference for `bytes`
pub fn inline_reference(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, BASE64.encode(bytes))
}

pub fn is_inline(reference: &str) -> bool {
    reference.starts_with("data:")
}

/// Durable writer with an inline fallback
#[derive(Clone)]
pub struct StorageFallbackWriter {
    store: SharedStore,
    invoker: ResilientInvoker,
    delete_timeout: Duration,
}

impl std::fmt::Debug for StorageFallbackWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFallbackWriter")
            .field("store", &self.store.name())
            .field("policy", self.invoker.policy())
            .field("delete_timeout", &self.delete_timeout)
            .finish()
    }
}

impl StorageFallbackWriter {
    pub fn new(store: SharedStore, policy: RetryPolicy, delete_timeout: Duration) -> Self {
        Self {
            store,
            invoker: ResilientInvoker::new(policy),
            delete_timeout,
        }
    }

    /// Write bytes, degrading to an inline reference on any failure
    pub async fn write(&self, bytes: &[u8], meta: &WriteMeta, credential: &Credential) -> StoredRef {
        match self.write_durable(bytes, meta, credential).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    store = self.store.name(),
                    category = %e.category(),
                    error = %e,
                    size = bytes.len(),
                    "Durable write failed, falling back to inline reference"
                );
                StoredRef {
                    reference: inline_reference(&meta.content_type, bytes),
                    degraded: true,
                }
            }
        }
    }

    /// Write bytes durably or fail
    pub async fn write_durable(
        &self,
        bytes: &[u8],
        meta: &WriteMeta,
        credential: &Credential,
    ) -> Result<StoredRef> {
        let options = PutOptions {
            public: meta.public,
            content_type: meta.content_type.clone(),
        };
        let store: &dyn ObjectStore = self.store.as_ref();
        let options = &options;

        let object = self
            .invoker
            .invoke("storage write", || {
                let name = object_name(meta);
                async move {
                    debug!(store = store.name(), name = %name, "Writing object");
                    store.put(&name, bytes, options, credential).await
                }
            })
            .await?;

        Ok(StoredRef {
            reference: object.url,
            degraded: false,
        })
    }

    /// Best-effort delete; inline references have nothing to delete
    pub async fn delete(&self, reference: &str, credential: &Credential) {
        if is_inline(reference) {
            return;
        }

        let result = with_timeout(
            self.delete_timeout,
            self.store.delete(reference, credential),
            "storage delete",
        )
        .await;

        if let Err(e) = result {
            warn!(
                store = self.store.name(),
                reference,
                error = %e,
                "Best-effort delete failed"
            );
        }
    }
}

/// Fresh `<prefix>/<uuid>.<ext>` name, generated per attempt
fn object_name(meta: &WriteMeta) -> String {
    let prefix = meta.prefix.trim_matches('/');
    let ext = extension_for(&meta.content_type);
    if prefix.is_empty() {
        format!("{}.{}", Uuid::new_v4(), ext)
    } else {
        format!("{}/{}.{}", prefix, Uuid::new_v4(), ext)
    }
}
