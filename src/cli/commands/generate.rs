//! Generate Command
//!
//! Runs one studio request and prints the response envelope.
//!
//! Usage:
//!   assetflow generate --target <id> --source <ref>... [--mode both] [--fact key=value]...

use std::collections::BTreeMap;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::service::{StudioOptions, StudioRequest};
use crate::types::{FlowError, GenerationMode, Result};

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub target: String,
    pub sources: Vec<String>,
    pub mode: GenerationMode,
    /// Raw `key=value` pairs
    pub facts: Vec<String>,
    pub budget_ms: Option<u64>,
}

/// Returns whether the request succeeded
pub async fn run(ctx: &CommandContext, options: GenerateOptions, output: &Output) -> Result<bool> {
    let facts = parse_facts(&options.facts)?;
    let service = ctx.studio_service()?;

    output.section(&format!(
        "Generating {} for {} ({} source(s))",
        options.mode,
        options.target,
        options.sources.len()
    ));

    let request = StudioRequest {
        target_id: options.target,
        source_refs: options.sources,
        options: StudioOptions {
            facts,
            budget_ms: options.budget_ms,
        },
    };
    let response = service
        .handle(options.mode, request, ctx.credential.as_ref())
        .await;

    match (&response.error, &response.result) {
        (Some(error), _) => output.error(&error.message),
        (None, Some(result)) => {
            for notice in &result.notices {
                output.warning(&notice.detail);
            }
            output.success(&format!(
                "{} image(s), listing: {} in {}ms",
                result.images.len(),
                result
                    .text_mode
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                response.duration_ms
            ));
        }
        (None, None) => {}
    }

    output.json(&response)?;
    Ok(response.success)
}

fn parse_facts(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| FlowError::validation("fact", format!("expected key=value, got '{}'", pair)))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(FlowError::validation("fact", format!("empty key in '{}'", pair)));
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_facts() {
        let facts = parse_facts(&["brand=Acme".to_string(), "size = 42 x 40".to_string()]).unwrap();
        assert_eq!(facts["brand"], "Acme");
        assert_eq!(facts["size"], "42 x 40");

        assert!(parse_facts(&["brand".to_string()]).is_err());
        assert!(parse_facts(&["=x".to_string()]).is_err());
    }
}
