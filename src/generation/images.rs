//! Sequential image loop.
//!
//! Each target is fetched, transformed and written before the next one
//! starts. The first target starts whenever the deadline has not passed;
//! later targets start only while the remaining budget covers the average
//! duration of the steps run so far. Once it doesn't, every remaining
//! target is `NotAttempted`.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::Credential;
use crate::constants::storage::STUDIO_PREFIX;
use crate::inference::{ImageInput, InferenceRequest, PromptTemplates, SharedProvider};
use crate::resilience::{ResilientInvoker, RetryPolicy, TimeBudget, with_timeout};
use crate::storage::{SharedFetcher, StorageFallbackWriter, StoredRef, WriteMeta};
use crate::types::{FlowError, ItemOutcome, ItemReport, Result};

#[derive(Clone)]
pub(crate) struct ImagePipeline {
    pub provider: SharedProvider,
    pub fetcher: SharedFetcher,
    pub writer: StorageFallbackWriter,
    pub transform_policy: RetryPolicy,
    pub fetch_policy: RetryPolicy,
}

/// Running average of finished step durations
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct StepEstimate {
    total: Duration,
    steps: u32,
}

impl StepEstimate {
    pub fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.steps += 1;
    }

    /// `None` until a step has finished
    pub fn expected(&self) -> Option<Duration> {
        (self.steps > 0).then(|| self.total / self.steps)
    }

    /// Whether `budget` can take another step
    pub fn admits(&self, budget: &TimeBudget) -> bool {
        if budget.is_exhausted() {
            return false;
        }
        self.expected().is_none_or(|expected| budget.has_at_least(expected))
    }
}

impl ImagePipeline {
    pub async fn run(
        &self,
        targets: &[String],
        budget: &TimeBudget,
        credential: &Credential,
    ) -> Vec<ItemReport> {
        let mut reports = Vec::with_capacity(targets.len());
        let mut estimate = StepEstimate::default();

        for (index, source_ref) in targets.iter().enumerate() {
            if !estimate.admits(budget) {
                info!(
                    remaining_ms = budget.remaining().as_millis() as u64,
                    expected_step_ms = estimate.expected().map(|d| d.as_millis() as u64),
                    skipped = targets.len() - index,
                    "Budget cannot cover another image, not starting remaining images"
                );
                reports.extend(targets[index..].iter().map(|r| ItemReport {
                    source_ref: r.clone(),
                    outcome: ItemOutcome::NotAttempted,
                }));
                break;
            }

            debug!(index, source = %short(source_ref), "Starting image step");
            let started = Instant::now();
            let step = self.step(source_ref, budget, credential);
            let stepped = with_timeout(budget.remaining(), step, "image step").await;
            estimate.record(started.elapsed());
            let outcome = match stepped {
                Ok(stored) => ItemOutcome::Completed {
                    reference: stored.reference,
                    degraded: stored.degraded,
                },
                Err(e) => {
                    warn!(index, source = %short(source_ref), error = %e, "Image step failed");
                    ItemOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            reports.push(ItemReport {
                source_ref: source_ref.clone(),
                outcome,
            });
        }

        reports
    }

    /// fetch → transform → write
    async fn step(
        &self,
        source_ref: &str,
        budget: &TimeBudget,
        credential: &Credential,
    ) -> Result<StoredRef> {
        let fetcher = self.fetcher.as_ref();
        let source = ResilientInvoker::new(self.fetch_policy.capped(budget))
            .invoke("source fetch", || fetcher.fetch(source_ref))
            .await?;

        let request = InferenceRequest::image_transform(
            PromptTemplates::image_transform(),
            ImageInput {
                mime: source.content_type,
                bytes: source.bytes,
            },
        );
        let provider = self.provider.as_ref();
        let request = &request;

        let image = ResilientInvoker::new(self.transform_policy.capped(budget))
            .invoke("image transform", || async move {
                let response = provider.generate(request, credential).await?;
                response
                    .first_image()
                    .cloned()
                    .ok_or_else(|| FlowError::transient(provider.name(), "response contained no image"))
            })
            .await?;

        let meta = WriteMeta::new(image.mime, STUDIO_PREFIX);
        Ok(self.writer.write(&image.bytes, &meta, credential).await)
    }
}

fn short(reference: &str) -> String {
    reference.chars().take(64).collect()
}
