//! Generation Orchestrator
//!
//! Produces studio images and listing copy for one item within a wall-clock
//! budget:
//!
//! ```text
//! received ──┬── image loop (sequential) ──┬── assembling ── done
//!            └── listing task (spawned) ───┘
//! ```
//!
//! The listing task runs concurrently with the image loop and is awaited
//! only for whatever budget remains. Every fallback taken along the way is
//! reported as a `DegradedNotice` and marks the result `partial`; only
//! precondition failures surface as errors.

mod images;
mod listing;
#[cfg(test)]
pub(crate) mod test_support;

pub use listing::ListingOutcome;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::auth::{Credential, require_credential};
use crate::config::Config;
use crate::constants::generation as gen_constants;
use crate::inference::SharedProvider;
use crate::normalize::ResponseNormalizer;
use crate::resilience::{RetryPolicy, TimeBudget};
use crate::storage::{SharedFetcher, StorageFallbackWriter};
use crate::types::{
    DegradedNotice, FlowError, GenerationRequest, GenerationResult, ItemOutcome,
    ItemReport, NoticeKind, Result,
};

use images::ImagePipeline;
use listing::ListingGenerator;

/// Per-call retry policies
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub transform_policy: RetryPolicy,
    pub augmented_policy: RetryPolicy,
    pub quick_policy: RetryPolicy,
    pub fetch_policy: RetryPolicy,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        let policy = |attempts, timeout_ms| RetryPolicy::new(attempts, Duration::from_millis(timeout_ms));
        Self {
            transform_policy: policy(gen_constants::IMAGE_ATTEMPTS, gen_constants::IMAGE_TIMEOUT_MS),
            augmented_policy: policy(
                gen_constants::AUGMENTED_ATTEMPTS,
                gen_constants::AUGMENTED_TIMEOUT_MS,
            ),
            quick_policy: policy(gen_constants::QUICK_ATTEMPTS, gen_constants::QUICK_TIMEOUT_MS),
            fetch_policy: policy(gen_constants::FETCH_ATTEMPTS, gen_constants::FETCH_TIMEOUT_MS),
        }
    }
}

impl GenerationSettings {
    pub fn from_config(config: &Config) -> Self {
        let g = &config.generation;
        let retry = &config.retry;
        Self {
            transform_policy: retry.policy(g.image_attempts, g.image_timeout_ms),
            augmented_policy: retry.policy(g.augmented_attempts, g.augmented_timeout_ms),
            quick_policy: retry.policy(g.quick_attempts, g.quick_timeout_ms),
            fetch_policy: retry.policy(g.fetch_attempts, g.fetch_timeout_ms),
        }
    }
}

/// Budgeted image + listing generation for one item
#[derive(Clone)]
pub struct GenerationOrchestrator {
    images: ImagePipeline,
    listing: ListingGenerator,
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("provider", &self.images.provider.name())
            .field("writer", &self.images.writer)
            .field("transform_policy", &self.images.transform_policy)
            .finish()
    }
}

impl GenerationOrchestrator {
    pub fn new(
        provider: SharedProvider,
        fetcher: SharedFetcher,
        writer: StorageFallbackWriter,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            images: ImagePipeline {
                provider: Arc::clone(&provider),
                fetcher: Arc::clone(&fetcher),
                writer,
                transform_policy: settings.transform_policy,
                fetch_policy: settings.fetch_policy,
            },
            listing: ListingGenerator {
                provider,
                fetcher,
                normalizer: ResponseNormalizer::new(),
                augmented_policy: settings.augmented_policy,
                quick_policy: settings.quick_policy,
                fetch_policy: settings.fetch_policy,
            },
        }
    }

    /// Run a request to completion within `budget`
    ///
    /// Fails only on missing credentials or invalid input; everything else
    /// is reported per item and through notices.
    #[instrument(
        skip_all,
        fields(
            mode = %request.mode,
            targets = request.target_asset_refs.len(),
            budget_ms = budget.total().as_millis() as u64
        )
    )]
    pub async fn run(
        &self,
        request: &GenerationRequest,
        budget: TimeBudget,
        credential: Option<&Credential>,
    ) -> Result<GenerationResult> {
        let credential = require_credential(credential)?;
        validate(request)?;

        let listing_task = request
            .mode
            .wants_listing()
            .then(|| self.spawn_listing(request, budget, credential));

        let items = if request.mode.wants_images() {
            self.images
                .run(&request.target_asset_refs, &budget, credential)
                .await
        } else {
            Vec::new()
        };

        let listing = match listing_task {
            Some(handle) => Some(await_listing(handle, &budget).await),
            None => None,
        };

        let result = assemble(items, listing);
        info!(
            images = result.images.len(),
            partial = result.partial,
            text_mode = ?result.text_mode,
            elapsed_ms = budget.elapsed().as_millis() as u64,
            "Generation finished"
        );
        Ok(result)
    }

    fn spawn_listing(
        &self,
        request: &GenerationRequest,
        budget: TimeBudget,
        credential: &Credential,
    ) -> JoinHandle<Result<ListingOutcome>> {
        let generator = self.listing.clone();
        let facts = request.extra_facts.clone();
        let photo_ref = request.target_asset_refs.first().cloned();
        let credential = credential.clone();

        tokio::spawn(async move {
            generator
                .generate(&facts, photo_ref.as_deref(), budget, &credential)
                .await
        })
    }
}

fn validate(request: &GenerationRequest) -> Result<()> {
    if let Some(index) = request
        .target_asset_refs
        .iter()
        .position(|r| r.trim().is_empty())
    {
        return Err(FlowError::validation(
            format!("targetAssetRefs[{}]", index),
            "reference is empty",
        ));
    }

    if request.mode.wants_images() && request.target_asset_refs.is_empty() {
        return Err(FlowError::validation(
            "targetAssetRefs",
            format!("mode '{}' needs at least one source image", request.mode),
        ));
    }

    if request.target_asset_refs.is_empty() && request.extra_facts.is_empty() {
        return Err(FlowError::validation(
            "extraFacts",
            "nothing to describe: no source images and no facts",
        ));
    }

    Ok(())
}

/// Wait for the listing task for at most the remaining budget
async fn await_listing(
    mut handle: JoinHandle<Result<ListingOutcome>>,
    budget: &TimeBudget,
) -> std::result::Result<ListingOutcome, String> {
    match tokio::time::timeout(budget.remaining(), &mut handle).await {
        Ok(Ok(Ok(outcome))) => Ok(outcome),
        Ok(Ok(Err(e))) => Err(e.to_string()),
        Ok(Err(join_err)) => {
            warn!(error = %join_err, "Listing task aborted");
            Err(format!("listing task aborted: {}", join_err))
        }
        Err(_) => {
            warn!("Budget exhausted before listing finished, returning without text");
            handle.abort();
            Err("budget exhausted before listing finished".to_string())
        }
    }
}

fn assemble(
    items: Vec<ItemReport>,
    listing: Option<std::result::Result<ListingOutcome, String>>,
) -> GenerationResult {
    let mut result = GenerationResult::default();

    let mut degraded = 0;
    for item in &items {
        if let ItemOutcome::Completed {
            reference,
            degraded: inline,
        } = &item.outcome
        {
            result.images.push(reference.clone());
            if *inline {
                degraded += 1;
            }
        }
    }
    result.items = items;

    if degraded > 0 {
        result.notices.push(DegradedNotice::new(
            NoticeKind::InlineStorage,
            format!("{} image(s) returned inline; storage was unavailable", degraded),
        ));
    }

    let not_attempted = result.not_attempted().count();
    if not_attempted > 0 {
        result.notices.push(DegradedNotice::new(
            NoticeKind::ItemsNotAttempted,
            format!("{} image(s) not attempted; budget exhausted", not_attempted),
        ));
    }

    match listing {
        Some(Ok(outcome)) => {
            if let Some(reason) = &outcome.fallback_reason {
                result.notices.push(DegradedNotice::new(
                    NoticeKind::QuickTextMode,
                    format!("research unavailable ({}); text uses local facts only", reason),
                ));
            }
            if let Some(reason) = &outcome.photo_error {
                result.notices.push(DegradedNotice::new(
                    NoticeKind::ListingPhotoUnavailable,
                    format!("source photo unavailable ({}); text written without it", reason),
                ));
            }
            result.title = outcome.copy.title;
            result.description = outcome.copy.description;
            result.analysis_text = outcome.copy.analysis;
            result.sources = outcome.sources;
            result.text_mode = Some(outcome.mode);
        }
        Some(Err(reason)) => {
            result
                .notices
                .push(DegradedNotice::new(NoticeKind::ListingUnavailable, reason));
        }
        None => {}
    }

    result.partial = !result.notices.is_empty() || result.failed().next().is_some();
    result
}
