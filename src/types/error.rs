//! Unified Error Type System
//!
//! Centralized error types for the whole pipeline.
//! Provides error classification for retry and propagation decisions.
//!
//! ## Error Categories
//!
//! - **Auth**: Missing or rejected credential (fail fast, abort the operation)
//! - **Validation**: Malformed or missing input (fail fast, field-level message)
//! - **Transient**: Network, timeout or provider failure (retry, then isolate per item)
//! - **RateLimit**: Provider throttling (retry with backoff)
//! - **Parse**: Model output unintelligible (fatal for that one call)
//! - **Config**: Collaborator not configured (no retry)
//!
//! Precondition failures abort the whole operation before work starts. Every
//! other failure is isolated to its item and aggregated into a partial result.

use std::time::Duration;
use thiserror::Error;

use super::asset::{AssetId, AssetStatus};

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories used for retry and propagation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credential missing or rejected - abort, never retry
    Auth,
    /// Input rejected - abort, never retry
    Validation,
    /// Collaborator not configured - no point retrying
    Config,
    /// Provider throttling - retry with backoff
    RateLimit,
    /// Network/timeout/5xx - retry with backoff
    Transient,
    /// Model output could not be normalized - retry the call
    Parse,
    /// Request rejected by provider (4xx) - retrying will not help
    BadRequest,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth => write!(f, "AUTH"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Config => write!(f, "CONFIG"),
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Parse => write!(f, "PARSE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category may be retried by the invoker
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Transient | Self::Parse | Self::Unknown
        )
    }

    /// Check if this category aborts the whole operation
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth | Self::Validation)
    }
}

// =============================================================================
// External Error
// =============================================================================

/// Failure reported by an external collaborator (storage, inference, fetch)
#[derive(Debug, Clone)]
pub struct ExternalError {
    /// Error category for routing decisions
    pub category: ErrorCategory,
    /// Collaborator that produced the error
    pub service: String,
    /// Detailed error message
    pub message: String,
}

impl std::fmt::Display for ExternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.service, self.category, self.message)
    }
}

impl std::error::Error for ExternalError {}

impl ExternalError {
    pub fn new(
        category: ErrorCategory,
        service: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            service: service.into(),
            message: message.into(),
        }
    }

    /// Transient failure (network, 5xx, empty payload)
    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Transient, service, message)
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps collaborator responses onto error categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an HTTP status code returned by a collaborator
    pub fn classify_http_status(status: u16, message: &str, service: &str) -> ExternalError {
        let category = match status {
            401 | 403 => ErrorCategory::Auth,
            429 => ErrorCategory::RateLimit,
            408 | 500 | 502 | 503 | 504 => ErrorCategory::Transient,
            400 | 404 | 409 | 413 | 415 | 422 => ErrorCategory::BadRequest,
            _ => ErrorCategory::Unknown,
        };
        ExternalError::new(category, service, format!("HTTP {}: {}", status, message))
    }

    /// Classify a transport-level reqwest failure
    pub fn classify_transport(err: &reqwest::Error, service: &str) -> ExternalError {
        if let Some(status) = err.status() {
            return Self::classify_http_status(status.as_u16(), &err.to_string(), service);
        }
        // Connect, timeout and body errors are all worth another attempt
        ExternalError::transient(service, err.to_string())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field-level validation failure
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Field that failed validation
    pub field: String,
    /// Detailed message
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation failed for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Parse Error
// =============================================================================

/// Maximum characters of offending text kept for diagnostics
pub const PARSE_SNIPPET_CHARS: usize = 300;

/// Model output that no normalization strategy could interpret
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Why the last strategy failed
    pub reason: String,
    /// First characters of the offending text
    pub snippet: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (content preview: {})", self.reason, self.snippet)
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            snippet: raw.chars().take(PARSE_SNIPPET_CHARS).collect(),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum FlowError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Precondition Errors (abort the whole operation)
    // -------------------------------------------------------------------------
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Validation(ValidationError),

    #[error("Config error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Per-call Errors (isolated per item)
    // -------------------------------------------------------------------------
    #[error("External error: {0}")]
    External(ExternalError),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Parse error: {0}")]
    Parse(ParseError),

    // -------------------------------------------------------------------------
    // Ledger Errors
    // -------------------------------------------------------------------------
    #[error("{count} upload(s) still in flight; wait for the ledger to settle")]
    UploadsInFlight { count: usize },

    #[error("Unknown asset: {0}")]
    UnknownAsset(AssetId),

    #[error("Asset {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: AssetId,
        from: AssetStatus,
        to: AssetStatus,
    },
}

impl From<ExternalError> for FlowError {
    fn from(err: ExternalError) -> Self {
        FlowError::External(err)
    }
}

impl From<ValidationError> for FlowError {
    fn from(err: ValidationError) -> Self {
        FlowError::Validation(err)
    }
}

impl From<ParseError> for FlowError {
    fn from(err: ParseError) -> Self {
        FlowError::Parse(err)
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl FlowError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a field-level validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, message))
    }

    /// Create a transient external error
    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::External(ExternalError::transient(service, message))
    }

    /// Category used for retry and propagation decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth(_) => ErrorCategory::Auth,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Config(_) => ErrorCategory::Config,
            Self::External(e) => e.category,
            Self::Timeout { .. } | Self::Io(_) => ErrorCategory::Transient,
            Self::Parse(_) | Self::Json(_) => ErrorCategory::Parse,
            Self::UploadsInFlight { .. }
            | Self::UnknownAsset(_)
            | Self::InvalidTransition { .. } => ErrorCategory::BadRequest,
        }
    }

    /// Check if the invoker may retry after this error
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Stable machine-readable code for response envelopes
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth_error",
            Self::Validation(_) => "validation_error",
            Self::Config(_) => "config_error",
            Self::External(_) | Self::Io(_) => "external_error",
            Self::Timeout { .. } => "timeout",
            Self::Parse(_) | Self::Json(_) => "parse_error",
            Self::UploadsInFlight { .. } => "uploads_in_flight",
            Self::UnknownAsset(_) => "unknown_asset",
            Self::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
