//! Studio Request Surface
//!
//! One operation per endpoint: `{targetId, sourceRefs, options}` in,
//! `{success, result|error, partial, durationMs}` out. Each endpoint has a
//! hard ceiling that bounds the request's time budget.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::auth::Credential;
use crate::config::GenerationConfig;
use crate::generation::GenerationOrchestrator;
use crate::resilience::TimeBudget;
use crate::types::{FlowError, GenerationMode, GenerationRequest, GenerationResult, Result};

/// Endpoint served by the studio; maps one-to-one onto a generation mode
pub type StudioEndpoint = GenerationMode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioOptions {
    /// Locally known facts passed to the listing prompts
    #[serde(default)]
    pub facts: BTreeMap<String, String>,
    /// Caller budget; never exceeds the endpoint ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioRequest {
    pub target_id: String,
    #[serde(default)]
    pub source_refs: Vec<String>,
    #[serde(default)]
    pub options: StudioOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl From<&FlowError> for ErrorBody {
    fn from(err: &FlowError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioResponse {
    pub success: bool,
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub partial: bool,
    pub duration_ms: u64,
}

/// Serves studio requests through the generation orchestrator
#[derive(Debug, Clone)]
pub struct StudioService {
    orchestrator: GenerationOrchestrator,
    ceilings: GenerationConfig,
}

impl StudioService {
    pub fn new(orchestrator: GenerationOrchestrator, ceilings: GenerationConfig) -> Self {
        Self {
            orchestrator,
            ceilings,
        }
    }

    /// Budget for a request: the endpoint ceiling, narrowed by the caller's
    pub fn budget_for(&self, endpoint: StudioEndpoint, options: &StudioOptions) -> TimeBudget {
        let budget = TimeBudget::new(self.ceilings.ceiling(endpoint));
        match options.budget_ms {
            Some(ms) => budget.narrowed(Duration::from_millis(ms)),
            None => budget,
        }
    }

    /// Handle one request; errors are folded into the response envelope
    #[instrument(skip_all, fields(endpoint = %endpoint, target = %request.target_id))]
    pub async fn handle(
        &self,
        endpoint: StudioEndpoint,
        request: StudioRequest,
        credential: Option<&Credential>,
    ) -> StudioResponse {
        let budget = self.budget_for(endpoint, &request.options);
        let outcome = self.run(endpoint, &request, budget, credential).await;
        let duration_ms = budget.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => StudioResponse {
                success: true,
                target_id: request.target_id,
                partial: result.partial,
                result: Some(result),
                error: None,
                duration_ms,
            },
            Err(e) => {
                warn!(code = e.code(), error = %e, "Studio request rejected");
                StudioResponse {
                    success: false,
                    target_id: request.target_id,
                    result: None,
                    error: Some(ErrorBody::from(&e)),
                    partial: false,
                    duration_ms,
                }
            }
        }
    }

    async fn run(
        &self,
        endpoint: StudioEndpoint,
        request: &StudioRequest,
        budget: TimeBudget,
        credential: Option<&Credential>,
    ) -> Result<GenerationResult> {
        if request.target_id.trim().is_empty() {
            return Err(FlowError::validation("targetId", "must not be empty"));
        }

        let generation = GenerationRequest {
            target_asset_refs: request.source_refs.clone(),
            mode: endpoint,
            extra_facts: request.options.facts.clone(),
        };
        self.orchestrator.run(&generation, budget, credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationSettings;
    use crate::generation::test_support::{
        MemoryStore, Reply, ScriptedProvider, orchestrator, orchestrator_with,
    };
    use crate::types::{ItemOutcome, TextMode};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn service(provider: ScriptedProvider) -> StudioService {
        StudioService::new(
            orchestrator(provider, Arc::new(MemoryStore)),
            GenerationConfig::default(),
        )
    }

    fn request(refs: usize) -> StudioRequest {
        StudioRequest {
            target_id: "item-42".to_string(),
            source_refs: (0..refs).map(|i| format!("https://cdn.test/{}.jpg", i)).collect(),
            options: StudioOptions {
                facts: BTreeMap::from([("condition".to_string(), "used".to_string())]),
                budget_ms: None,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_endpoint_success() {
        let service = service(ScriptedProvider::new(100));
        let credential = Credential::bearer("token").unwrap();

        let response = service
            .handle(GenerationMode::Both, request(2), Some(&credential))
            .await;

        assert!(response.success);
        assert!(!response.partial);
        assert_eq!(response.target_id, "item-42");
        let result = response.result.unwrap();
        assert_eq!(result.images.len(), 2);
        assert!(!result.title.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_budget_with_default_settings() {
        let service = StudioService::new(
            orchestrator_with(
                ScriptedProvider::new(2000),
                Arc::new(MemoryStore),
                GenerationSettings::default(),
            ),
            GenerationConfig::default(),
        );
        let credential = Credential::bearer("token").unwrap();
        let mut req = request(3);
        req.options.budget_ms = Some(5000);
        let start = Instant::now();

        let response = service
            .handle(GenerationMode::Both, req, Some(&credential))
            .await;

        assert!(start.elapsed() <= Duration::from_millis(5000));
        assert!(response.success);
        assert!(response.partial);
        let result = response.result.unwrap();
        assert_eq!(result.images.len(), 2);
        assert_eq!(result.items[2].outcome, ItemOutcome::NotAttempted);
        assert_eq!(result.text_mode, Some(TextMode::Augmented));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_endpoint_bounded_by_ceiling() {
        let provider = ScriptedProvider {
            augmented: Reply::Hang,
            quick: Reply::Hang,
            ..ScriptedProvider::new(0)
        };
        let service = service(provider);
        let credential = Credential::bearer("token").unwrap();
        let mut req = request(1);
        req.options.budget_ms = Some(120_000);
        let start = Instant::now();

        let response = service
            .handle(GenerationMode::Listing, req, Some(&credential))
            .await;

        assert!(start.elapsed() <= Duration::from_secs(30));
        assert!(response.success);
        assert!(response.partial);
        assert!(response.result.unwrap().text_mode.is_none());
    }

    #[tokio::test]
    async fn test_caller_budget_narrows_ceiling() {
        let service = service(ScriptedProvider::new(0));
        let options = StudioOptions {
            budget_ms: Some(5_000),
            ..Default::default()
        };

        let budget = service.budget_for(GenerationMode::Images, &options);
        assert!(budget.remaining() <= Duration::from_secs(5));

        let unbounded = service.budget_for(GenerationMode::Listing, &StudioOptions::default());
        assert!(unbounded.remaining() <= Duration::from_secs(30));
        assert!(unbounded.remaining() > Duration::from_secs(29));
    }

    #[tokio::test]
    async fn test_errors_fold_into_envelope() {
        let service = service(ScriptedProvider::new(0));

        let response = service.handle(GenerationMode::Images, request(1), None).await;
        assert!(!response.success);
        assert!(response.result.is_none());
        assert_eq!(response.error.as_ref().unwrap().code, "auth_error");

        let credential = Credential::bearer("token").unwrap();
        let mut blank = request(1);
        blank.target_id = "  ".to_string();
        let response = service
            .handle(GenerationMode::Images, blank, Some(&credential))
            .await;
        assert_eq!(response.error.unwrap().code, "validation_error");
    }

    #[test]
    fn test_envelope_serialization() {
        let response = StudioResponse {
            success: false,
            target_id: "item-1".to_string(),
            result: None,
            error: Some(ErrorBody {
                code: "auth_error",
                message: "missing credential".to_string(),
            }),
            partial: false,
            duration_ms: 12,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["targetId"], "item-1");
        assert_eq!(json["durationMs"], 12);
        assert_eq!(json["error"]["code"], "auth_error");
        assert!(json.get("result").is_none());

        let request: StudioRequest = serde_json::from_str(
            r#"{"targetId":"x","sourceRefs":["a"],"options":{"facts":{"brand":"Acme"},"budgetMs":900}}"#,
        )
        .unwrap();
        assert_eq!(request.options.budget_ms, Some(900));
        assert_eq!(request.options.facts["brand"], "Acme");
    }
}
