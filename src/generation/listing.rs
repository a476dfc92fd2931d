//! Listing Copy Generation
//!
//! Two-tier strategy:
//! 1. Augmented: tool-enabled call with the first source photo
//! 2. Quick: bare call using only the locally supplied facts
//!
//! Any augmented failure (provider error, timeout, unparseable or empty
//! output) falls through to quick mode while budget remains.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::auth::Credential;
use crate::inference::{
    ImageInput, InferenceRequest, PromptTemplates, SharedProvider, Tool,
};
use crate::normalize::{ListingCopy, ResponseNormalizer};
use crate::resilience::{ResilientInvoker, RetryPolicy, TimeBudget};
use crate::storage::SharedFetcher;
use crate::types::{FlowError, ParseError, Result, SourceLink, TextMode};

/// Listing text and the path that produced it
#[derive(Debug, Clone)]
pub struct ListingOutcome {
    pub copy: ListingCopy,
    pub sources: Vec<SourceLink>,
    pub mode: TextMode,
    /// Why the augmented path was abandoned, when quick mode was used
    pub fallback_reason: Option<String>,
    /// Why the source photo was left out of the augmented call
    pub photo_error: Option<String>,
}

/// Augmented copy plus the photo fetch failure it survived, if any
type AugmentedCopy = (ListingCopy, Vec<SourceLink>, Option<String>);

#[derive(Clone)]
pub(crate) struct ListingGenerator {
    pub provider: SharedProvider,
    pub fetcher: SharedFetcher,
    pub normalizer: ResponseNormalizer,
    pub augmented_policy: RetryPolicy,
    pub quick_policy: RetryPolicy,
    pub fetch_policy: RetryPolicy,
}

impl ListingGenerator {
    pub async fn generate(
        &self,
        facts: &BTreeMap<String, String>,
        photo_ref: Option<&str>,
        budget: TimeBudget,
        credential: &Credential,
    ) -> Result<ListingOutcome> {
        let augmented = self.augmented(facts, photo_ref, &budget, credential).await;
        let reason = match augmented {
            Ok((copy, sources, photo_error)) => {
                info!(sources = sources.len(), with_photo = photo_error.is_none(), "Listing generated (augmented)");
                return Ok(ListingOutcome {
                    copy,
                    sources,
                    mode: TextMode::Augmented,
                    fallback_reason: None,
                    photo_error,
                });
            }
            Err(e) => {
                warn!(category = %e.category(), error = %e, "Augmented listing failed, falling back to quick mode");
                e.to_string()
            }
        };

        if budget.is_exhausted() {
            return Err(FlowError::timeout("listing generation", budget.total()));
        }

        let request = InferenceRequest::text(PromptTemplates::quick_listing(facts));
        let policy = self.quick_policy.capped(&budget);
        let (copy, _) = self.call("listing (quick)", policy, &request, credential).await?;

        info!("Listing generated (quick)");
        Ok(ListingOutcome {
            copy,
            sources: Vec::new(),
            mode: TextMode::Quick,
            fallback_reason: Some(reason),
            photo_error: None,
        })
    }

    async fn augmented(
        &self,
        facts: &BTreeMap<String, String>,
        photo_ref: Option<&str>,
        budget: &TimeBudget,
        credential: &Credential,
    ) -> Result<AugmentedCopy> {
        let mut request =
            InferenceRequest::text(PromptTemplates::augmented_listing(facts)).with_tool(Tool::WebSearch);

        let mut photo_error = None;
        if let Some(reference) = photo_ref {
            let fetcher = self.fetcher.as_ref();
            let fetched = ResilientInvoker::new(self.fetch_policy.capped(budget))
                .invoke("listing photo fetch", || fetcher.fetch(reference))
                .await;
            match fetched {
                Ok(photo) => {
                    request.image = Some(ImageInput {
                        mime: photo.content_type,
                        bytes: photo.bytes,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Listing photo unavailable, continuing with facts only");
                    photo_error = Some(e.to_string());
                }
            }
        }

        let policy = self.augmented_policy.capped(budget);
        let (copy, sources) = self
            .call("listing (augmented)", policy, &request, credential)
            .await?;
        Ok((copy, sources, photo_error))
    }

    /// One model call through the invoker, normalized into listing copy
    async fn call(
        &self,
        operation: &str,
        policy: RetryPolicy,
        request: &InferenceRequest,
        credential: &Credential,
    ) -> Result<(ListingCopy, Vec<SourceLink>)> {
        let provider = self.provider.as_ref();
        let normalizer = self.normalizer;

        ResilientInvoker::new(policy)
            .invoke(operation, || async move {
                let response = provider.generate(request, credential).await?;
                let copy: ListingCopy = normalizer.normalize_into(&response.text)?;
                if copy.is_empty() {
                    return Err(ParseError::new("listing has no title or description", &response.text).into());
                }
                Ok((copy, response.grounding_sources))
            })
            .await
    }
}
