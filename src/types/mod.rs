pub mod asset;
pub mod error;
pub mod generation;

pub use asset::{AssetId, AssetRecord, AssetStatus, RawAsset};
pub use error::{
    ErrorCategory, ErrorClassifier, ExternalError, FlowError, ParseError, Result,
    ValidationError,
};
pub use generation::{
    DegradedNotice, GenerationMode, GenerationRequest, GenerationResult, ItemOutcome,
    ItemReport, NoticeKind, SourceLink, TextMode,
};
