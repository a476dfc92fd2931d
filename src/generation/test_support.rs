//! Scripted collaborators for orchestration tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{GenerationOrchestrator, GenerationSettings};
use crate::auth::Credential;
use crate::inference::{InferenceProvider, InferenceRequest, InferenceResponse, InferenceTask, Media};
use crate::resilience::RetryPolicy;
use crate::storage::{ObjectStore, PutOptions, SourceFetcher, StorageFallbackWriter, StoredObject};
use crate::types::{FlowError, RawAsset, Result, SourceLink};

#[derive(Clone, Copy)]
pub enum Reply {
    Listing,
    NotJson,
    Hang,
}

pub struct ScriptedProvider {
    pub image_delay: Duration,
    pub augmented: Reply,
    pub quick: Reply,
}

impl ScriptedProvider {
    pub fn new(image_delay_ms: u64) -> Self {
        Self {
            image_delay: Duration::from_millis(image_delay_ms),
            augmented: Reply::Listing,
            quick: Reply::Listing,
        }
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &InferenceRequest,
        _credential: &Credential,
    ) -> Result<InferenceResponse> {
        if request.task == InferenceTask::ImageTransform {
            tokio::time::sleep(self.image_delay).await;
            return Ok(InferenceResponse {
                media: vec![Media {
                    mime: "image/png".into(),
                    bytes: b"studio".to_vec(),
                }],
                ..Default::default()
            });
        }

        let (reply, title) = if request.tools.is_empty() {
            (self.quick, "Side table")
        } else {
            (self.augmented, "Walnut side table, 1960s")
        };
        match reply {
            Reply::Listing => Ok(InferenceResponse {
                text: format!(
                    "```json\n{{\"title\": \"{}\", \"description\": \"Solid wood.\"}}\n```",
                    title
                ),
                grounding_sources: vec![SourceLink {
                    title: Some("Comparable".into()),
                    url: Some("https://shop.test/1".into()),
                }],
                ..Default::default()
            }),
            Reply::NotJson => Ok(InferenceResponse {
                text: "I cannot help with that.".into(),
                ..Default::default()
            }),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Err(FlowError::transient("scripted", "unreachable"))
            }
        }
    }
}

pub struct TestFetcher;

#[async_trait]
impl SourceFetcher for TestFetcher {
    async fn fetch(&self, reference: &str) -> Result<RawAsset> {
        if reference.starts_with("missing") {
            return Err(FlowError::validation("source", "file not found"));
        }
        Ok(RawAsset::new(reference, b"photo".to_vec(), "image/jpeg"))
    }
}

pub struct MemoryStore;

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(
        &self,
        name: &str,
        _bytes: &[u8],
        _options: &PutOptions,
        _credential: &Credential,
    ) -> Result<StoredObject> {
        Ok(StoredObject {
            url: format!("https://cdn.test/{}", name),
        })
    }

    async fn delete(&self, _url: &str, _credential: &Credential) -> Result<()> {
        Ok(())
    }
}

pub fn settings() -> GenerationSettings {
    GenerationSettings {
        transform_policy: RetryPolicy::new(1, Duration::from_millis(3000)),
        ..Default::default()
    }
}

pub fn orchestrator(provider: ScriptedProvider, store: Arc<dyn ObjectStore>) -> GenerationOrchestrator {
    orchestrator_with(provider, store, settings())
}

pub fn orchestrator_with(
    provider: ScriptedProvider,
    store: Arc<dyn ObjectStore>,
    settings: GenerationSettings,
) -> GenerationOrchestrator {
    let writer = StorageFallbackWriter::new(
        store,
        RetryPolicy::new(2, Duration::from_millis(500)),
        Duration::from_secs(1),
    );
    GenerationOrchestrator::new(Arc::new(provider), Arc::new(TestFetcher), writer, settings)
}
