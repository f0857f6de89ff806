//! Boundary trait between the flow and the HTTP transport.
//!
//! The orchestrator only ever talks to this trait; `doppel-api` provides the
//! reqwest-backed implementation, tests provide fakes.

use crate::error::ApiError;
use crate::types::{FeatureKind, SelectedFile, Transformation, UsageData};
use async_trait::async_trait;

/// Callback for fractional transport upload progress in [0, 1].
pub type ProgressFn = Box<dyn Fn(f32) + Send + Sync>;

/// The remote face-swap service, as the flow sees it.
///
/// One call per operation, no retries; a failed call surfaces immediately and
/// re-entry is an explicit user action.
#[async_trait]
pub trait SwapApi: Send + Sync {
    /// Submit a selfie for transformation. One multipart POST; `on_progress`
    /// reports transport upload progress while the body streams out.
    async fn submit_transformation(
        &self,
        file: &SelectedFile,
        mode: FeatureKind,
        on_progress: ProgressFn,
    ) -> Result<Transformation, ApiError>;

    /// Fetch the current quota snapshot.
    async fn get_usage_status(&self) -> Result<UsageData, ApiError>;
}
