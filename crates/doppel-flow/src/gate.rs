//! Registration gate — interaction point offered when quota runs out.
//!
//! Purely presentational state: an open flag plus the feature whose quota
//! triggered it. Real authentication sits behind the `AuthProvider`
//! capability; the shipped provider is a stub that never yields a session.

use async_trait::async_trait;
use doppel_core::types::FeatureKind;

/// An authenticated session handed back by a provider.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
}

/// Capability interface for external identity providers.
///
/// Injected rather than discovered through global state, so the flow can be
/// exercised with fakes and real SDK integrations stay at the edge.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Whether the provider is loaded and able to attempt a login.
    fn is_ready(&self) -> bool;
    async fn sign_up(&self) -> Option<Session>;
    async fn log_in(&self) -> Option<Session>;
}

/// Placeholder provider: always ready, never produces a session.
pub struct StubAuthProvider;

#[async_trait]
impl AuthProvider for StubAuthProvider {
    fn is_ready(&self) -> bool {
        true
    }

    async fn sign_up(&self) -> Option<Session> {
        tracing::info!("sign-up requested (stub provider, no credential exchange)");
        None
    }

    async fn log_in(&self) -> Option<Session> {
        tracing::info!("login requested (stub provider, no credential exchange)");
        None
    }
}

#[derive(Debug, Default)]
pub struct RegistrationGate {
    open: bool,
    last_feature_attempted: Option<FeatureKind>,
}

impl RegistrationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, feature: FeatureKind) {
        tracing::info!(%feature, "opening registration gate");
        self.open = true;
        self.last_feature_attempted = Some(feature);
    }

    pub fn close(&mut self) {
        self.open = false;
        self.last_feature_attempted = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The feature whose exhausted quota opened the gate.
    pub fn last_feature_attempted(&self) -> Option<FeatureKind> {
        self.last_feature_attempted
    }
}
