//! assetflow - Asset Upload and AI Studio Pipeline
//!
//! Takes raw item photos from a user, uploads them concurrently into a
//! ledger of durable references, and turns them into studio-quality images
//! and marketplace listing copy under a wall-clock budget.
//!
//! ## Core Features
//!
//! - **Upload Ledger**: concurrent uploads with retry, removal and an event stream
//! - **Budgeted Generation**: sequential image loop with a concurrent listing task
//! - **Graceful Degradation**: inline storage fallback and quick listing mode
//! - **Resilient Calls**: one invoker for timeouts, retries and backoff
//!
//! ## Quick Start
//!
//! ```ignore
//! use assetflow::{CommandContext, GenerationMode, StudioRequest};
//!
//! let ctx = CommandContext::load(None)?;
//! let service = ctx.studio_service()?;
//! let response = service
//!     .handle(GenerationMode::Both, request, ctx.credential.as_ref())
//!     .await;
//! ```
//!
//! ## Modules
//!
//! - [`upload`]: upload coordinator and ledger
//! - [`generation`]: budgeted image and listing orchestration
//! - [`service`]: request/response surface with endpoint ceilings
//! - [`storage`]: object stores, fallback writer, source fetcher
//! - [`inference`]: model provider abstraction and prompts
//! - [`resilience`]: invoker, timeouts, budgets
//! - [`normalize`]: model output to typed JSON

pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod generation;
pub mod inference;
pub mod normalize;
pub mod resilience;
pub mod service;
pub mod storage;
pub mod types;
pub mod upload;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use auth::Credential;
pub use cli::CommandContext;
pub use config::{Config, ConfigLoader};
pub use types::error::{ErrorCategory, FlowError, Result};
pub use types::{
    AssetId, AssetRecord, AssetStatus, GenerationMode, GenerationRequest, GenerationResult,
    RawAsset, TextMode,
};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use generation::{GenerationOrchestrator, GenerationSettings};
pub use normalize::{ListingCopy, ResponseNormalizer};
pub use resilience::{ResilientInvoker, RetryPolicy, TimeBudget, with_timeout};
pub use service::{StudioRequest, StudioResponse, StudioService};
pub use storage::{ObjectStore, StorageFallbackWriter, StoredRef};
pub use upload::{LedgerEvent, LedgerSnapshot, UploadCoordinator};
