//! Response Normalization
//!
//! Turns free-form model text into structured data by trying an ordered
//! chain of lenient strategies; the first one that parses wins:
//!
//! 1. Parse directly
//! 2. Strip code fences and retry
//! 3. Extract the first balanced `{...}` and retry
//! 4. Escape literal newlines/tabs, strip control bytes, retry
//!
//! Only when all of them fail does the caller get a `ParseError` carrying
//! the reason and a snippet of the offending text.

mod listing;
mod strategies;

pub use listing::ListingCopy;
pub use strategies::{
    extract_balanced_object, parse_direct, sanitize_control_chars, strip_code_fences,
};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::types::{ParseError, Result};

/// Which strategy produced the parsed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    FenceStripped,
    Extracted,
    Sanitized,
}

/// Multi-strategy lenient parser for model output
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse model text into a JSON value
    pub fn normalize(&self, raw: &str) -> Result<Value> {
        self.normalize_with_strategy(raw).map(|(value, _)| value)
    }

    /// Parse model text, reporting which strategy succeeded
    pub fn normalize_with_strategy(&self, raw: &str) -> Result<(Value, Strategy)> {
        let text = raw.trim().trim_start_matches('\u{feff}');

        if let Ok(value) = parse_direct(text) {
            return Ok((value, Strategy::Direct));
        }

        let fenced = strip_code_fences(text);
        if let Some(body) = &fenced
            && let Ok(value) = parse_direct(body)
        {
            debug!("Model output parsed after stripping code fences");
            return Ok((value, Strategy::FenceStripped));
        }

        let base = fenced.as_deref().unwrap_or(text);
        let extracted = extract_balanced_object(base);
        if let Some(object) = extracted
            && let Ok(value) = parse_direct(object)
        {
            debug!("Model output parsed from embedded object");
            return Ok((value, Strategy::Extracted));
        }

        let sanitized = sanitize_control_chars(extracted.unwrap_or(base));
        match parse_direct(&sanitized) {
            Ok(value) => {
                debug!("Model output parsed after control character sanitization");
                Ok((value, Strategy::Sanitized))
            }
            Err(e) => Err(ParseError::new(
                format!("no normalization strategy succeeded: {}", e),
                raw,
            )
            .into()),
        }
    }

    /// Parse model text into a typed structure
    ///
    /// Types should use `#[serde(default)]` so missing optional fields become
    /// empty values instead of failures.
    pub fn normalize_into<T: DeserializeOwned>(&self, raw: &str) -> Result<T> {
        let value = self.normalize(raw)?;
        serde_json::from_value(value)
            .map_err(|e| ParseError::new(format!("unexpected shape: {}", e), raw).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FlowError;

    #[test]
    fn test_direct_parse() {
        let (value, strategy) = ResponseNormalizer::new()
            .normalize_with_strategy(r#"{"a": 1}"#)
            .unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(strategy, Strategy::Direct);
    }

    #[test]
    fn test_fenced_json() {
        let (value, strategy) = ResponseNormalizer::new()
            .normalize_with_strategy("```json\n{\"a\":1}\n```")
            .unwrap();
        assert_eq!(value, serde_json::json!({"a": 1}));
        assert_eq!(strategy, Strategy::FenceStripped);
    }

    #[test]
    fn test_embedded_object() {
        let raw = "Sure! Here is the listing:\n{\"title\": \"Brass lamp\"}\nLet me know.";
        let (value, strategy) = ResponseNormalizer::new()
            .normalize_with_strategy(raw)
            .unwrap();
        assert_eq!(value["title"], "Brass lamp");
        assert_eq!(strategy, Strategy::Extracted);
    }

    #[test]
    fn test_control_character_inside_string() {
        let raw = "```json\n{\"description\": \"Solid oak.\nMinor wear.\"}\n```";
        let (value, strategy) = ResponseNormalizer::new()
            .normalize_with_strategy(raw)
            .unwrap();
        assert_eq!(value["description"], "Solid oak.\nMinor wear.");
        assert_eq!(strategy, Strategy::Sanitized);
    }

    #[test]
    fn test_non_json_raises_parse_error_with_snippet() {
        let raw = "I'm sorry, I can't describe this item.";
        match ResponseNormalizer::new().normalize(raw).unwrap_err() {
            FlowError::Parse(err) => {
                assert_eq!(err.snippet, raw);
                assert!(err.reason.contains("no normalization strategy"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_normalize_into_defaults_missing_fields() {
        let copy: ListingCopy = ResponseNormalizer::new()
            .normalize_into(r#"{"title": "Desk"}"#)
            .unwrap();
        assert_eq!(copy.title, "Desk");
        assert!(copy.description.is_empty());
        assert!(copy.analysis.is_empty());
    }

    #[test]
    fn test_normalize_into_wrong_shape() {
        let result: Result<ListingCopy> =
            ResponseNormalizer::new().normalize_into(r#"{"title": ["not", "a", "string"]}"#);
        assert!(matches!(result.unwrap_err(), FlowError::Parse(_)));
    }
}
