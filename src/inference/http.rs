//! HTTP Inference Provider
//!
//! Adapter for a `generateContent`-style JSON API. Images travel as base64
//! `inlineData` parts in both directions; grounding sources come back in
//! the candidate's grounding metadata.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{InferenceProvider, InferenceRequest, InferenceResponse, InferenceTask, Media, Tool};
use crate::auth::Credential;
use crate::config::InferenceConfig;
use crate::constants::network;
use crate::types::{ErrorClassifier, FlowError, Result, SourceLink};

const SERVICE: &str = "inference";

pub struct HttpInferenceProvider {
    api_base: String,
    text_model: String,
    image_model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpInferenceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInferenceProvider")
            .field("api_base", &self.api_base)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl HttpInferenceProvider {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .as_deref()
            .ok_or_else(|| FlowError::Config("inference.api_base is not configured".to_string()))?
            .trim_end_matches('/')
            .to_string();

        url::Url::parse(&api_base).map_err(|e| {
            FlowError::Config(format!("Invalid inference api_base '{}': {}", api_base, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.client_timeout_secs))
            .connect_timeout(Duration::from_secs(network::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| FlowError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_base,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            temperature: config.temperature,
            client,
        })
    }

    fn model_for(&self, task: InferenceTask) -> &str {
        match task {
            InferenceTask::ImageTransform => &self.image_model,
            InferenceTask::Text => &self.text_model,
        }
    }

    fn build_request(&self, request: &InferenceRequest) -> GenerateRequest {
        let mut parts = vec![Part {
            text: Some(request.prompt.clone()),
            inline_data: None,
        }];
        if let Some(image) = &request.image {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.mime.clone(),
                    data: BASE64.encode(&image.bytes),
                }),
            });
        }

        let tools = request
            .tools
            .iter()
            .map(|tool| match tool {
                Tool::WebSearch => ToolSpec {
                    google_search: serde_json::json!({}),
                },
            })
            .collect();

        let response_modalities = match request.task {
            InferenceTask::ImageTransform => Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            InferenceTask::Text => None,
        };

        GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            tools,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                response_modalities,
            },
        }
    }
}

/// Flatten a response body into text, media and grounding sources
fn collect_response(body: GenerateResponse) -> Result<InferenceResponse> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| FlowError::transient(SERVICE, "response contained no candidates"))?;

    let mut out = InferenceResponse::default();
    let mut texts = Vec::new();

    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            texts.push(text);
        }
        if let Some(inline) = part.inline_data {
            let bytes = BASE64.decode(inline.data.as_bytes()).map_err(|e| {
                FlowError::transient(SERVICE, format!("media base64 decode failed: {}", e))
            })?;
            out.media.push(Media {
                mime: inline.mime_type,
                bytes,
            });
        }
    }
    out.text = texts.join("");

    if let Some(grounding) = candidate.grounding_metadata {
        out.grounding_sources = grounding
            .grounding_chunks
            .into_iter()
            .filter_map(|chunk| chunk.web)
            .map(|web| SourceLink {
                title: web.title,
                url: web.uri,
            })
            .collect();
    }

    if out.text.trim().is_empty() && out.media.is_empty() {
        return Err(FlowError::transient(SERVICE, "response contained no content"));
    }

    Ok(out)
}

#[async_trait]
impl InferenceProvider for HttpInferenceProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(
        &self,
        request: &InferenceRequest,
        credential: &Credential,
    ) -> Result<InferenceResponse> {
        let model = self.model_for(request.task);
        info!(
            model,
            tools = request.tools.len(),
            with_image = request.image.is_some(),
            "Generating"
        );

        let start_time = Instant::now();
        let body = self.build_request(request);
        let url = format!("{}/models/{}:generateContent", self.api_base, model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", credential.header_value())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, SERVICE))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(model, status = status.as_u16(), "Inference request rejected");
            return Err(ErrorClassifier::classify_http_status(status.as_u16(), &text, SERVICE).into());
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, SERVICE))?;

        debug!(
            model,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Received inference response"
        );
        collect_response(body)
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        alias = "inline_data"
    )]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSpec {
    google_search: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}
