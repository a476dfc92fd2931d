//! Generation Types
//!
//! Requests and results of the AI studio orchestration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// What a generation request should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Images,
    Listing,
    #[default]
    Both,
}

impl GenerationMode {
    pub fn wants_images(self) -> bool {
        matches!(self, GenerationMode::Images | GenerationMode::Both)
    }

    pub fn wants_listing(self) -> bool {
        matches!(self, GenerationMode::Listing | GenerationMode::Both)
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Images => write!(f, "images"),
            GenerationMode::Listing => write!(f, "listing"),
            GenerationMode::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "images" => Ok(GenerationMode::Images),
            "listing" => Ok(GenerationMode::Listing),
            "both" => Ok(GenerationMode::Both),
            _ => Err(format!(
                "Unknown generation mode: {}. Valid values: images, listing, both",
                s
            )),
        }
    }
}

/// Input of the generation orchestrator
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Committed or externally supplied asset references, in processing order
    pub target_asset_refs: Vec<String>,
    pub mode: GenerationMode,
    /// Locally known facts about the item (brand, size, condition, ...)
    pub extra_facts: BTreeMap<String, String>,
}

/// Which listing path produced the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    /// Tool-enabled call with external research
    Augmented,
    /// Bare call using only local facts
    Quick,
}

impl fmt::Display for TextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextMode::Augmented => write!(f, "augmented"),
            TextMode::Quick => write!(f, "quick"),
        }
    }
}

/// Research source cited by an augmented listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SourceLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Outcome of one image target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ItemOutcome {
    Completed {
        #[serde(rename = "ref")]
        reference: String,
        degraded: bool,
    },
    Failed {
        reason: String,
    },
    /// Budget ran out before the item started
    NotAttempted,
}

/// Per-target record of the image loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    pub source_ref: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

/// Fallback path taken somewhere in a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    /// Durable storage failed; the payload was returned inline
    InlineStorage,
    /// Augmented listing failed; quick mode produced the text
    QuickTextMode,
    /// No listing text could be produced in time
    ListingUnavailable,
    /// Source photo could not be fetched; listing used facts only
    ListingPhotoUnavailable,
    /// Budget ran out before some targets started
    ItemsNotAttempted,
}

/// Degraded-mode notice: not an error, reported alongside the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradedNotice {
    pub kind: NoticeKind,
    pub detail: String,
}

impl DegradedNotice {
    pub fn new(kind: NoticeKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Assembled output of a generation request
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub images: Vec<String>,
    pub title: String,
    pub description: String,
    pub analysis_text: String,
    pub sources: Vec<SourceLink>,
    /// `None` when no listing text was produced
    pub text_mode: Option<TextMode>,
    pub partial: bool,
    pub items: Vec<ItemReport>,
    pub notices: Vec<DegradedNotice>,
}

impl GenerationResult {
    /// Targets skipped because the budget ran out
    pub fn not_attempted(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|i| i.outcome == ItemOutcome::NotAttempted)
    }

    /// Targets that were attempted and failed
    pub fn failed(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|i| matches!(i.outcome, ItemOutcome::Failed { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_mode_parse() {
        assert_eq!(
            "images".parse::<GenerationMode>().unwrap(),
            GenerationMode::Images
        );
        assert_eq!(
            "BOTH".parse::<GenerationMode>().unwrap(),
            GenerationMode::Both
        );
        assert!("video".parse::<GenerationMode>().is_err());
    }

    #[test]
    fn test_generation_mode_flags() {
        assert!(GenerationMode::Both.wants_images());
        assert!(GenerationMode::Both.wants_listing());
        assert!(!GenerationMode::Listing.wants_images());
        assert!(!GenerationMode::Images.wants_listing());
    }

    #[test]
    fn test_item_report_serialization() {
        let report = ItemReport {
            source_ref: "https://cdn/a.jpg".to_string(),
            outcome: ItemOutcome::NotAttempted,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "notAttempted");
        assert_eq!(json["sourceRef"], "https://cdn/a.jpg");
    }
}
