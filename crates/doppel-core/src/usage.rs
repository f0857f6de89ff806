//! Usage tracker — local view of server-side quota.
//!
//! Holds the latest `UsageData` snapshot. Quota is decremented server-side
//! only; the tracker observes it via fetches, refreshes after successful
//! transformations, and snapshots embedded in 429 errors. Single writer:
//! nothing else mutates the snapshot.

use crate::error::UsageLimitError;
use crate::types::{FeatureKind, UsageData};

#[derive(Debug, Default)]
pub struct UsageTracker {
    snapshot: Option<UsageData>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot with a freshly fetched one.
    pub fn record(&mut self, usage: UsageData) {
        tracing::debug!(
            matches = format_args!("{}/{}", usage.matches_used, usage.matches_limit),
            randomizes = format_args!("{}/{}", usage.randomizes_used, usage.randomizes_limit),
            unlimited = usage.unlimited,
            "usage snapshot recorded"
        );
        self.snapshot = Some(usage);
    }

    pub fn snapshot(&self) -> Option<&UsageData> {
        self.snapshot.as_ref()
    }

    /// Whether the given feature may be used right now.
    ///
    /// Fail-open: with no snapshot loaded (first visit, or the initial fetch
    /// failed) the answer is yes — the server remains the authoritative
    /// enforcer via 429 responses.
    pub fn can_use(&self, feature: FeatureKind) -> bool {
        match &self.snapshot {
            None => {
                tracing::debug!(%feature, "no usage data loaded, allowing");
                true
            }
            Some(usage) => usage.allows(feature),
        }
    }

    /// Adopt the snapshot embedded in a 429 without issuing a new fetch.
    /// No-op when the error carries none.
    pub fn apply_limit_error(&mut self, err: &UsageLimitError) {
        if let Some(usage) = &err.usage {
            self.record(usage.clone());
        }
    }

    /// True when at least one feature is exhausted for a non-unlimited session.
    pub fn is_limited(&self) -> bool {
        self.snapshot.as_ref().is_some_and(UsageData::exhausted)
    }

    /// Forget the snapshot (e.g. after login changes the session identity).
    pub fn clear(&mut self) {
        self.snapshot = None;
    }
}
