//! Generative Inference Abstraction
//!
//! Defines the `InferenceProvider` trait used for image transforms and
//! listing copy. Providers are plain transports: timeouts and retries are
//! applied by the caller through the resilient invoker.
//!
//! ## Modules
//!
//! - `http`: JSON API adapter with base64 media parts
//! - `prompt`: prompt builder and the pipeline's prompt templates

mod http;
pub mod prompt;

pub use http::HttpInferenceProvider;
pub use prompt::{PromptBuilder, PromptTemplates};

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::Credential;
use crate::config::InferenceConfig;
use crate::types::{FlowError, Result, SourceLink};

/// What a request is for; selects the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceTask {
    /// Image in, image out
    ImageTransform,
    /// Listing text
    Text,
}

/// Tool the model may call while answering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// Grounding through web search
    WebSearch,
}

/// Inline image sent with a request
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub task: InferenceTask,
    pub prompt: String,
    pub image: Option<ImageInput>,
    pub tools: Vec<Tool>,
}

impl InferenceRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            task: InferenceTask::Text,
            prompt: prompt.into(),
            image: None,
            tools: Vec::new(),
        }
    }

    pub fn image_transform(prompt: impl Into<String>, image: ImageInput) -> Self {
        Self {
            task: InferenceTask::ImageTransform,
            prompt: prompt.into(),
            image: Some(image),
            tools: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }
}

/// Media returned by the model
#[derive(Debug, Clone)]
pub struct Media {
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct InferenceResponse {
    /// Concatenated text parts
    pub text: String,
    pub media: Vec<Media>,
    /// Sources cited by grounding tools
    pub grounding_sources: Vec<SourceLink>,
}

impl InferenceResponse {
    /// First returned image, if any
    pub fn first_image(&self) -> Option<&Media> {
        self.media.iter().find(|m| m.mime.starts_with("image/"))
    }
}

/// Generative inference collaborator
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    async fn generate(
        &self,
        request: &InferenceRequest,
        credential: &Credential,
    ) -> Result<InferenceResponse>;
}

pub type SharedProvider = Arc<dyn InferenceProvider>;

/// Provider used when no inference API is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredProvider;

#[async_trait]
impl InferenceProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn generate(
        &self,
        _request: &InferenceRequest,
        _credential: &Credential,
    ) -> Result<InferenceResponse> {
        Err(FlowError::Config(
            "inference.api_base is not configured".to_string(),
        ))
    }
}

/// Build the provider selected by configuration
pub fn build_provider(config: &InferenceConfig) -> Result<SharedProvider> {
    match &config.api_base {
        Some(_) => Ok(Arc::new(HttpInferenceProvider::new(config)?)),
        None => Ok(Arc::new(UnconfiguredProvider)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let req = InferenceRequest::text("describe").with_tool(Tool::WebSearch);
        assert_eq!(req.task, InferenceTask::Text);
        assert_eq!(req.tools, vec![Tool::WebSearch]);
        assert!(req.image.is_none());

        let img = ImageInput {
            mime: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        let req = InferenceRequest::image_transform("clean background", img);
        assert_eq!(req.task, InferenceTask::ImageTransform);
        assert!(req.tools.is_empty());
    }

    #[test]
    fn test_first_image_skips_other_media() {
        let response = InferenceResponse {
            media: vec![
                Media {
                    mime: "audio/wav".into(),
                    bytes: vec![0],
                },
                Media {
                    mime: "image/png".into(),
                    bytes: vec![1],
                },
            ],
            ..Default::default()
        };
        assert_eq!(response.first_image().map(|m| m.bytes.clone()), Some(vec![1]));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = build_provider(&InferenceConfig::default()).unwrap();
        assert_eq!(provider.name(), "unconfigured");
        let cred = Credential::bearer("t").unwrap();
        let result = provider.generate(&InferenceRequest::text("x"), &cred).await;
        assert!(matches!(result, Err(FlowError::Config(_))));
    }
}
