//! Reqwest-backed implementation of the `SwapApi` boundary.

use crate::config::ApiConfig;
use async_trait::async_trait;
use bytes::Bytes;
use doppel_core::api::{ProgressFn, SwapApi};
use doppel_core::error::{ApiError, UsageLimitError};
use doppel_core::types::{FeatureKind, SelectedFile, Transformation, UsageData};
use reqwest::multipart;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Chunk size for the streamed multipart body. Small enough that transport
/// progress ticks visibly on typical selfie sizes.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Generic error envelope the server uses for non-429 failures.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the face-swap backend.
pub struct SwapClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl SwapClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ApiError::Other(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.post(format!("{}{}", self.base_url, path)))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Token {token}")),
            None => builder,
        }
    }

    /// Poll the result of an earlier transformation by id.
    pub async fn get_status(&self, id: u64) -> Result<Transformation, ApiError> {
        let resp = self
            .get(&format!("/api/imagegen/status/{id}/"))
            .send()
            .await
            .map_err(classify_transport)?;
        let resp = check_status(resp).await?;
        resp.json::<Transformation>()
            .await
            .map_err(|e| ApiError::Other(e.to_string()))
    }

    /// Liveness probe. Success/failure only; never an error.
    pub async fn health(&self) -> bool {
        match self.get("/health/").send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "health probe failed");
                false
            }
        }
    }

    /// Build a streamed multipart body that reports fractional progress as
    /// chunks are pulled off the wire.
    fn progress_part(file: &SelectedFile, on_progress: ProgressFn) -> Result<multipart::Part, ApiError> {
        let total = file.size().max(1);
        let sent = Arc::new(AtomicU64::new(0));
        let chunks: Vec<Bytes> = file
            .bytes
            .chunks(UPLOAD_CHUNK_BYTES)
            .map(Bytes::copy_from_slice)
            .collect();

        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            let done = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            on_progress(done as f32 / total as f32);
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), file.size())
            .file_name(file.name.clone())
            .mime_str(file.media_type.mime())
            .map_err(|e| ApiError::Other(e.to_string()))
    }
}

#[async_trait]
impl SwapApi for SwapClient {
    async fn submit_transformation(
        &self,
        file: &SelectedFile,
        mode: FeatureKind,
        on_progress: ProgressFn,
    ) -> Result<Transformation, ApiError> {
        let path = match mode {
            FeatureKind::Match => "/api/imagegen/generate/",
            FeatureKind::Randomize => "/api/imagegen/randomize/",
        };
        tracing::debug!(
            %mode,
            file = %file.name,
            size_mb = format_args!("{:.1}", file.size() as f64 / 1024.0 / 1024.0),
            "uploading selfie"
        );

        let form = multipart::Form::new().part("selfie", Self::progress_part(file, on_progress)?);
        let resp = self
            .post(path)
            .multipart(form)
            .send()
            .await
            .map_err(classify_transport)?;
        let status = resp.status().as_u16();
        let resp = check_status(resp).await?;

        let result = resp
            .json::<Transformation>()
            .await
            .map_err(|e| ApiError::Other(e.to_string()))?;
        tracing::info!(status, id = result.id, match_name = %result.match_name, "transformation complete");
        Ok(result)
    }

    async fn get_usage_status(&self) -> Result<UsageData, ApiError> {
        let resp = self
            .get("/api/imagegen/usage/")
            .send()
            .await
            .map_err(classify_transport)?;
        let resp = check_status(resp).await?;
        resp.json::<UsageData>()
            .await
            .map_err(|e| ApiError::Other(e.to_string()))
    }
}

/// Classify connection-level reqwest failures into domain errors.
fn classify_transport(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_connect() {
        ApiError::Connection
    } else {
        ApiError::Other(err.to_string())
    }
}

/// Classify non-2xx responses into domain errors, consuming the body.
///
/// 429 carries the usage-limit envelope (feature type + embedded snapshot);
/// other statuses map to distinct shapes with user-facing messages.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    tracing::debug!(status = status.as_u16(), url = %resp.url(), "api request failed");

    match status.as_u16() {
        429 => {
            let body = resp.text().await.unwrap_or_default();
            match serde_json::from_str::<UsageLimitError>(&body) {
                Ok(limit) => Err(ApiError::UsageLimit(limit)),
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable 429 body");
                    Err(ApiError::Server {
                        status: 429,
                        message: "Usage limit reached".to_string(),
                    })
                }
            }
        }
        401 => Err(ApiError::Auth),
        413 => Err(ApiError::PayloadTooLarge),
        code => {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("Server error: {code}"));
            Err(ApiError::Server { status: code, message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doppel_core::types::MediaType;
    use std::sync::Mutex;

    fn client_for(server: &mockito::Server) -> SwapClient {
        SwapClient::new(&ApiConfig::for_base_url(server.url())).unwrap()
    }

    fn selfie(size: usize) -> SelectedFile {
        SelectedFile {
            name: "selfie.png".into(),
            media_type: MediaType::Png,
            bytes: vec![0u8; size],
        }
    }

    fn napoleon_json() -> String {
        serde_json::json!({
            "id": 1,
            "match_name": "Napoleon",
            "match_score": 0.93,
            "message": "Successfully transformed you into Napoleon!",
            "output_image_url": "https://cdn.example/out.jpg",
            "original_selfie_url": "https://cdn.example/in.jpg",
            "historical_figure_url": "https://cdn.example/fig.jpg"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_usage_status_fetch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/imagegen/usage/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"matches_used":1,"matches_limit":3,"randomizes_used":0,"randomizes_limit":1,
                    "can_match":true,"can_randomize":true,"is_limited":false}"#,
            )
            .create_async()
            .await;

        let usage = client_for(&server).get_usage_status().await.unwrap();
        assert_eq!(usage.matches_used, 1);
        assert!(usage.allows(FeatureKind::Match));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_usage_status_bare_unlimited() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/imagegen/usage/")
            .with_status(200)
            .with_body(r#"{"unlimited": true, "user_authenticated": true}"#)
            .create_async()
            .await;

        let usage = client_for(&server).get_usage_status().await.unwrap();
        assert!(usage.unlimited);
        assert!(usage.allows(FeatureKind::Randomize));
    }

    #[tokio::test]
    async fn test_token_attached_as_authorization_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/imagegen/usage/")
            .match_header("authorization", "Token secret123")
            .with_status(200)
            .with_body(r#"{"unlimited": true}"#)
            .create_async()
            .await;

        let mut config = ApiConfig::for_base_url(server.url());
        config.token = Some("secret123".into());
        SwapClient::new(&config)
            .unwrap()
            .get_usage_status()
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_reports_transport_progress() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/imagegen/generate/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(napoleon_json())
            .create_async()
            .await;

        let seen: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let result = client_for(&server)
            .submit_transformation(
                &selfie(200 * 1024),
                FeatureKind::Match,
                Box::new(move |frac| sink.lock().unwrap().push(frac)),
            )
            .await
            .unwrap();

        assert_eq!(result.match_name, "Napoleon");
        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        // Fractions are non-decreasing and end at 1.0
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!((seen.last().unwrap() - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_randomize_hits_randomize_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/imagegen/randomize/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(napoleon_json())
            .create_async()
            .await;

        client_for(&server)
            .submit_transformation(&selfie(1024), FeatureKind::Randomize, Box::new(|_| {}))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_429_classified_as_usage_limit() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/imagegen/randomize/")
            .with_status(429)
            .with_body(
                r#"{
                    "error": "Usage limit reached",
                    "message": "You have reached your limit for randomize. Please sign up to continue.",
                    "feature_type": "randomize",
                    "usage": {"matches_used":3,"matches_limit":3,"randomizes_used":1,
                              "randomizes_limit":1,"can_match":false,"can_randomize":false,
                              "is_limited":true},
                    "registration_required": true
                }"#,
            )
            .create_async()
            .await;

        let err = client_for(&server)
            .submit_transformation(&selfie(1024), FeatureKind::Randomize, Box::new(|_| {}))
            .await
            .unwrap_err();

        match err {
            ApiError::UsageLimit(limit) => {
                assert_eq!(limit.feature_type, FeatureKind::Randomize);
                assert!(limit.registration_required);
                assert!(!limit.usage.unwrap().can_randomize);
            }
            other => panic!("expected UsageLimit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unparseable_429_degrades_to_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/imagegen/generate/")
            .with_status(429)
            .with_body("too many requests")
            .create_async()
            .await;

        let err = client_for(&server)
            .submit_transformation(&selfie(1024), FeatureKind::Match, Box::new(|_| {}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_401_and_413_map_to_distinct_errors() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/imagegen/generate/")
            .with_status(401)
            .create_async()
            .await;
        let err = client_for(&server)
            .submit_transformation(&selfie(1024), FeatureKind::Match, Box::new(|_| {}))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Auth);

        let _m = server
            .mock("POST", "/api/imagegen/generate/")
            .with_status(413)
            .create_async()
            .await;
        let err = client_for(&server)
            .submit_transformation(&selfie(1024), FeatureKind::Match, Box::new(|_| {}))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::PayloadTooLarge);
    }

    #[tokio::test]
    async fn test_5xx_carries_server_message() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/imagegen/generate/")
            .with_status(500)
            .with_body(r#"{"error": "Face processing failed: no face detected"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .submit_transformation(&selfie(1024), FeatureKind::Match, Box::new(|_| {}))
            .await
            .unwrap_err();
        match err {
            ApiError::Server { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("no face detected"));
            }
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_polling() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/imagegen/status/42/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(napoleon_json())
            .create_async()
            .await;

        let result = client_for(&server).get_status(42).await.unwrap();
        assert!((result.match_score - 0.93).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_health_probe() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/health/")
            .with_status(200)
            .create_async()
            .await;
        assert!(client_for(&server).health().await);

        let unreachable =
            SwapClient::new(&ApiConfig::for_base_url("http://127.0.0.1:1")).unwrap();
        assert!(!unreachable.health().await);
    }
}
