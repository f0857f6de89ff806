/// Transport configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the face-swap backend.
    pub base_url: String,
    /// Optional API token, sent as `Authorization: Token <value>` when set.
    /// Absent on cookie-based deployments.
    pub token: Option<String>,
    /// Whole-request timeout. Face swaps can take minutes server-side.
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl ApiConfig {
    /// Load configuration from `DOPPEL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("DOPPEL_API_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8002".to_string()),
            token: std::env::var("DOPPEL_API_TOKEN").ok().filter(|t| !t.is_empty()),
            request_timeout_secs: env_u64("DOPPEL_REQUEST_TIMEOUT_SECS", 300),
            connect_timeout_secs: env_u64("DOPPEL_CONNECT_TIMEOUT_SECS", 10),
        }
    }

    /// Config pointing at the given base URL, with test-friendly timeouts.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            request_timeout_secs: 300,
            connect_timeout_secs: 10,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
