//! doppel-core — Domain types and state holders for the face-swap client.
//!
//! Holds the wire types shared with the server (usage snapshots,
//! transformation results), the local validation gate for selfie uploads,
//! the usage tracker, and the `SwapApi` boundary trait that the transport
//! layer implements.

pub mod api;
pub mod error;
pub mod types;
pub mod upload;
pub mod usage;

pub use api::SwapApi;
pub use error::{ApiError, UsageLimitError, ValidationError};
pub use types::{
    FeatureKind, MediaType, ProcessingState, ProcessingStep, SelectedFile, Transformation,
    UsageData,
};
pub use upload::{FileCandidate, UploadManager};
pub use usage::UsageTracker;
