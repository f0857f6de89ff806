//! Error taxonomy for the face-swap flow.
//!
//! Validation failures never leave the upload manager; usage-limit errors are
//! intercepted by the orchestrator and routed to the registration gate; every
//! other failure surfaces through the generic error state.

use crate::types::{FeatureKind, UsageData};
use serde::Deserialize;
use thiserror::Error;

/// Local pre-submission failures. These never reach the network.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Please select a valid image file (JPG, PNG, WebP)")]
    UnsupportedType(String),
    #[error("File size must be less than 10MB")]
    FileTooLarge { size: u64 },
}

/// Quota-exhausted failure, deserialized from an HTTP 429 body.
///
/// Distinguished from other API errors because it opens the registration gate
/// instead of the generic error state.
#[derive(Debug, Clone, PartialEq, Error, Deserialize)]
#[error("{message}")]
pub struct UsageLimitError {
    pub feature_type: FeatureKind,
    /// Snapshot the server embeds so the client can update without a refetch.
    #[serde(default)]
    pub usage: Option<UsageData>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub registration_required: bool,
}

/// Transport and server failures, classified by the API client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error(transparent)]
    UsageLimit(#[from] UsageLimitError),
    #[error("Authentication failed. Check your API token.")]
    Auth,
    #[error("File too large. Please use an image under 10MB.")]
    PayloadTooLarge,
    #[error("Request timed out. Please try again.")]
    Timeout,
    #[error("Cannot connect to server. Please check your connection and try again.")]
    Connection,
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_limit_error_deserializes_429_body() {
        let err: UsageLimitError = serde_json::from_str(
            r#"{
                "error": "Usage limit reached",
                "message": "You have reached your limit for randomize. Please sign up to continue.",
                "feature_type": "randomize",
                "usage": {
                    "matches_used": 3, "matches_limit": 3,
                    "randomizes_used": 1, "randomizes_limit": 1,
                    "can_match": false, "can_randomize": false,
                    "is_limited": true
                },
                "registration_required": true
            }"#,
        )
        .unwrap();
        assert_eq!(err.feature_type, FeatureKind::Randomize);
        assert!(err.registration_required);
        let usage = err.usage.unwrap();
        assert!(!usage.can_randomize);
        assert!(usage.exhausted());
    }

    #[test]
    fn test_usage_limit_error_tolerates_missing_snapshot() {
        let err: UsageLimitError =
            serde_json::from_str(r#"{"feature_type": "match", "message": "limit reached"}"#)
                .unwrap();
        assert_eq!(err.feature_type, FeatureKind::Match);
        assert!(err.usage.is_none());
        assert_eq!(err.to_string(), "limit reached");
    }

    #[test]
    fn test_api_error_messages_are_user_facing() {
        assert!(ApiError::Connection.to_string().contains("connect"));
        assert!(ApiError::PayloadTooLarge.to_string().contains("10MB"));
        let server = ApiError::Server {
            status: 500,
            message: "Face processing failed".into(),
        };
        assert!(server.to_string().contains("Face processing failed"));
    }
}
