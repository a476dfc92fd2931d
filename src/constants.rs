//! Global Constants
//!
//! Centralized defaults for timeouts, retry policies and budgets.
//! All magic numbers should be defined here with documentation.

/// Retry/backoff constants shared by every invoker policy
pub mod retry {
    /// Base delay before the first retry (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Backoff multiplier applied per attempt
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Maximum delay between retries (milliseconds)
    pub const MAX_DELAY_MS: u64 = 8_000;
}

/// Object storage constants
pub mod storage {
    /// Durable write timeout on the fast-fail path (milliseconds)
    pub const WRITE_TIMEOUT_MS: u64 = 8_000;

    /// Durable write attempts on the fast-fail path
    pub const WRITE_ATTEMPTS: u32 = 2;

    /// Best-effort delete timeout (milliseconds)
    pub const DELETE_TIMEOUT_MS: u64 = 5_000;

    /// Object name prefix for generated studio images
    pub const STUDIO_PREFIX: &str = "studio";

    /// Object name prefix for user uploads
    pub const UPLOAD_PREFIX: &str = "uploads";
}

/// Upload coordinator constants
pub mod upload {
    /// Per-attempt upload timeout (milliseconds)
    pub const TIMEOUT_MS: u64 = 30_000;

    /// Upload attempts before a record is marked failed
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Ledger event channel capacity
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;
}

/// Generation orchestrator constants
pub mod generation {
    /// Image transform call timeout (milliseconds)
    pub const IMAGE_TIMEOUT_MS: u64 = 20_000;

    /// Image transform attempts
    pub const IMAGE_ATTEMPTS: u32 = 2;

    /// Augmented (tool-enabled) listing call timeout (milliseconds)
    pub const AUGMENTED_TIMEOUT_MS: u64 = 22_000;

    /// Augmented listing attempts
    pub const AUGMENTED_ATTEMPTS: u32 = 1;

    /// Quick listing call timeout (milliseconds)
    pub const QUICK_TIMEOUT_MS: u64 = 10_000;

    /// Quick listing attempts
    pub const QUICK_ATTEMPTS: u32 = 2;

    /// Source fetch timeout (milliseconds)
    pub const FETCH_TIMEOUT_MS: u64 = 10_000;

    /// Source fetch attempts
    pub const FETCH_ATTEMPTS: u32 = 2;
}

/// Request/response surface ceilings
pub mod ceilings {
    /// Image batch endpoint ceiling (milliseconds)
    pub const IMAGES_MS: u64 = 60_000;

    /// Listing-only endpoint ceiling (milliseconds)
    pub const LISTING_MS: u64 = 30_000;

    /// Combined endpoint ceiling (milliseconds)
    pub const BOTH_MS: u64 = 60_000;
}

/// HTTP/Network constants
pub mod network {
    /// Client-level request timeout (seconds); per-call timeouts are shorter
    pub const CLIENT_TIMEOUT_SECS: u64 = 120;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
}
