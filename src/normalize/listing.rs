//! Typed view of listing-copy model output.

use serde::{Deserialize, Serialize};

/// Marketplace copy produced by a listing call
///
/// Every field is optional in the model output and defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingCopy {
    pub title: String,
    pub description: String,
    #[serde(alias = "analysis_text", alias = "analysisText")]
    pub analysis: String,
}

impl ListingCopy {
    /// No usable text at all (title and description both blank)
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.description.trim().is_empty()
    }
}
