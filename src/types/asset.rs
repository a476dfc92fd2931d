//! Asset Types
//!
//! Records tracked by the upload ledger and the raw payloads that feed it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type-safe wrapper for asset identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(String);

impl AssetId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Upload status of a single asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Pending,
    Uploading,
    Committed,
    Failed,
}

impl AssetStatus {
    /// Allowed transitions: forward only, plus `failed -> uploading` for retries
    pub fn can_transition_to(self, next: AssetStatus) -> bool {
        use AssetStatus::*;
        matches!(
            (self, next),
            (Pending, Uploading)
                | (Uploading, Committed)
                | (Uploading, Failed)
                | (Failed, Uploading)
        )
    }

    /// Still waiting on a network completion
    pub fn is_in_flight(self) -> bool {
        matches!(self, AssetStatus::Pending | AssetStatus::Uploading)
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetStatus::Pending => write!(f, "pending"),
            AssetStatus::Uploading => write!(f, "uploading"),
            AssetStatus::Committed => write!(f, "committed"),
            AssetStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Raw asset handed to the upload coordinator by the user
#[derive(Debug, Clone)]
pub struct RawAsset {
    /// Where the bytes came from (file name, picker handle)
    pub source_handle: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl RawAsset {
    pub fn new(
        source_handle: impl Into<String>,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            source_handle: source_handle.into(),
            bytes,
            content_type: content_type.into(),
        }
    }
}

/// One entry of the upload ledger
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: AssetId,
    pub source_handle: String,
    pub status: AssetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of dispatches; identifies which upload a completion belongs to
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetRecord {
    pub fn new(source_handle: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AssetId::generate(),
            source_handle: source_handle.into(),
            status: AssetStatus::Pending,
            committed_ref: None,
            error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(AssetStatus::Pending.can_transition_to(AssetStatus::Uploading));
        assert!(AssetStatus::Uploading.can_transition_to(AssetStatus::Committed));
        assert!(AssetStatus::Uploading.can_transition_to(AssetStatus::Failed));
        assert!(AssetStatus::Failed.can_transition_to(AssetStatus::Uploading));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(!AssetStatus::Committed.can_transition_to(AssetStatus::Uploading));
        assert!(!AssetStatus::Committed.can_transition_to(AssetStatus::Failed));
        assert!(!AssetStatus::Uploading.can_transition_to(AssetStatus::Pending));
        assert!(!AssetStatus::Failed.can_transition_to(AssetStatus::Committed));
        assert!(!AssetStatus::Pending.can_transition_to(AssetStatus::Committed));
    }

    #[test]
    fn test_in_flight() {
        assert!(AssetStatus::Pending.is_in_flight());
        assert!(AssetStatus::Uploading.is_in_flight());
        assert!(!AssetStatus::Failed.is_in_flight());
        assert!(!AssetStatus::Committed.is_in_flight());
    }
}
