//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global and project (.assetflow/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::Credential;
use crate::constants::{
    ceilings, generation as gen_constants, network, retry as retry_constants,
    storage as storage_constants, upload as upload_constants,
};
use crate::resilience::RetryPolicy;
use crate::types::{FlowError, GenerationMode, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Bearer credential settings
    pub auth: AuthConfig,

    /// Object storage collaborator
    pub storage: StorageConfig,

    /// Generative inference collaborator
    pub inference: InferenceConfig,

    /// Backoff shared by every retry policy
    pub retry: RetryConfig,

    /// Upload coordinator settings
    pub upload: UploadConfig,

    /// Generation orchestrator settings
    pub generation: GenerationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            inference: InferenceConfig::default(),
            retry: RetryConfig::default(),
            upload: UploadConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `FlowError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.retry.backoff_factor < 1.0 {
            return Err(FlowError::Config(format!(
                "retry.backoff_factor must be at least 1.0, got {}",
                self.retry.backoff_factor
            )));
        }

        let attempts = [
            ("storage.write_attempts", self.storage.write_attempts),
            ("upload.max_attempts", self.upload.max_attempts),
            ("generation.image_attempts", self.generation.image_attempts),
            (
                "generation.augmented_attempts",
                self.generation.augmented_attempts,
            ),
            ("generation.quick_attempts", self.generation.quick_attempts),
            ("generation.fetch_attempts", self.generation.fetch_attempts),
        ];
        if let Some((name, _)) = attempts.iter().find(|(_, v)| *v == 0) {
            return Err(FlowError::Config(format!(
                "{} must be greater than 0",
                name
            )));
        }

        let timeouts = [
            ("storage.write_timeout_ms", self.storage.write_timeout_ms),
            ("upload.timeout_ms", self.upload.timeout_ms),
            ("generation.image_timeout_ms", self.generation.image_timeout_ms),
            (
                "generation.augmented_timeout_ms",
                self.generation.augmented_timeout_ms,
            ),
            ("generation.quick_timeout_ms", self.generation.quick_timeout_ms),
            ("generation.fetch_timeout_ms", self.generation.fetch_timeout_ms),
            ("generation.images_ceiling_ms", self.generation.images_ceiling_ms),
            (
                "generation.listing_ceiling_ms",
                self.generation.listing_ceiling_ms,
            ),
            ("generation.both_ceiling_ms", self.generation.both_ceiling_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, v)| *v == 0) {
            return Err(FlowError::Config(format!(
                "{} must be greater than 0",
                name
            )));
        }

        if self.storage.backend == StorageBackend::Http && self.storage.endpoint.is_none() {
            return Err(FlowError::Config(
                "storage.endpoint is required for the http backend".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Auth Configuration
// =============================================================================

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token; never serialized to output
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AuthConfig {
    /// Credential from config, if a non-blank token is present
    pub fn credential(&self) -> Option<Credential> {
        self.token
            .as_deref()
            .and_then(|t| Credential::bearer(t).ok())
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// No durable storage; every write degrades to an inline payload
    #[default]
    None,
    /// Local directory with file:// references
    Local,
    /// Bucket REST API over HTTP
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Root directory for the local backend
    pub local_dir: PathBuf,

    /// Storage API base URL for the http backend
    pub endpoint: Option<String>,

    /// Bucket name for the http backend
    pub bucket: String,

    /// Public URL prefix for stored objects (defaults to endpoint/public/bucket)
    pub public_base_url: Option<String>,

    /// Per-attempt timeout on the fast-fail write path
    pub write_timeout_ms: u64,

    /// Attempts on the fast-fail write path
    pub write_attempts: u32,

    /// Best-effort delete timeout
    pub delete_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::None,
            local_dir: PathBuf::from(".assetflow/objects"),
            endpoint: None,
            bucket: "item-images".to_string(),
            public_base_url: None,
            write_timeout_ms: storage_constants::WRITE_TIMEOUT_MS,
            write_attempts: storage_constants::WRITE_ATTEMPTS,
            delete_timeout_ms: storage_constants::DELETE_TIMEOUT_MS,
        }
    }
}

// =============================================================================
// Inference Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Inference API base URL
    pub api_base: Option<String>,

    /// Model used for listing text
    pub text_model: String,

    /// Model used for image transforms
    pub image_model: String,

    /// HTTP client ceiling; per-call timeouts come from `generation`
    pub client_timeout_secs: u64,

    /// Temperature for listing text (0.0 = deterministic)
    pub temperature: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            client_timeout_secs: network::CLIENT_TIMEOUT_SECS,
            temperature: 0.4,
        }
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub backoff_factor: f32,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: retry_constants::BASE_DELAY_MS,
            backoff_factor: retry_constants::BACKOFF_FACTOR,
            max_delay_ms: retry_constants::MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// Build a policy with the shared backoff and call-specific limits
    pub fn policy(&self, max_attempts: u32, timeout_ms: u64) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(timeout_ms))
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_backoff_factor(self.backoff_factor)
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

// =============================================================================
// Upload Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub timeout_ms: u64,
    pub max_attempts: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            timeout_ms: upload_constants::TIMEOUT_MS,
            max_attempts: upload_constants::MAX_ATTEMPTS,
        }
    }
}

// =============================================================================
// Generation Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub image_timeout_ms: u64,
    pub image_attempts: u32,
    pub augmented_timeout_ms: u64,
    pub augmented_attempts: u32,
    pub quick_timeout_ms: u64,
    pub quick_attempts: u32,
    pub fetch_timeout_ms: u64,
    pub fetch_attempts: u32,
    pub images_ceiling_ms: u64,
    pub listing_ceiling_ms: u64,
    pub both_ceiling_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            image_timeout_ms: gen_constants::IMAGE_TIMEOUT_MS,
            image_attempts: gen_constants::IMAGE_ATTEMPTS,
            augmented_timeout_ms: gen_constants::AUGMENTED_TIMEOUT_MS,
            augmented_attempts: gen_constants::AUGMENTED_ATTEMPTS,
            quick_timeout_ms: gen_constants::QUICK_TIMEOUT_MS,
            quick_attempts: gen_constants::QUICK_ATTEMPTS,
            fetch_timeout_ms: gen_constants::FETCH_TIMEOUT_MS,
            fetch_attempts: gen_constants::FETCH_ATTEMPTS,
            images_ceiling_ms: ceilings::IMAGES_MS,
            listing_ceiling_ms: ceilings::LISTING_MS,
            both_ceiling_ms: ceilings::BOTH_MS,
        }
    }
}

impl GenerationConfig {
    /// Hard ceiling for an endpoint serving `mode`
    pub fn ceiling(&self, mode: GenerationMode) -> Duration {
        let ms = match mode {
            GenerationMode::Images => self.images_ceiling_ms,
            GenerationMode::Listing => self.listing_ceiling_ms,
            GenerationMode::Both => self.both_ceiling_ms,
        };
        Duration::from_millis(ms)
    }
}

// =============================================================================
// Tests
// =============================================================================
