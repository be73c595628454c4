//! Replicate predictions API implementation.
//!
//! Creates a Whisper prediction from a base64 data URI and fetches its status
//! by id. Both calls authenticate with `Authorization: Token <secret>`.

use async_trait::async_trait;
use std::time::Duration;

use super::backend::{Prediction, PredictionBackend, PredictionRequest};
use crate::config::BackendConfig;
use crate::error::BackendError;

/// HTTP client for the predictions endpoints.
#[derive(Debug, Clone)]
pub struct ReplicateBackend {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl ReplicateBackend {
    /// Builds a client with the configured request timeout.
    ///
    /// # Errors
    /// Returns `BackendError::Network` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig, api_token: String) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| BackendError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.api_token)
    }

    fn predictions_url(&self) -> String {
        format!("{}/predictions", self.base_url)
    }

    fn prediction_url(&self, id: &str) -> String {
        format!("{}/predictions/{}", self.base_url, urlencoding::encode(id))
    }

    async fn read_prediction(response: reqwest::Response) -> Result<Prediction, BackendError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("{}", describe_status(status, &body));
            return Err(BackendError::Http { status, body });
        }

        response
            .json::<Prediction>()
            .await
            .map_err(|e| BackendError::Decode(format!("failed to parse prediction: {e}")))
    }
}

#[async_trait]
impl PredictionBackend for ReplicateBackend {
    async fn create_prediction(&self, request: &PredictionRequest) -> Result<Prediction, BackendError> {
        let url = self.predictions_url();
        tracing::debug!(
            "Replicate API Call:\n  URL: {}\n  Method: POST\n  Headers:\n    Authorization: Token <redacted>\n  Model version: {}\n  Audio payload: {} bytes",
            url,
            request.version,
            request.input.audio.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(request)
            .send()
            .await
            .map_err(network_error)?;

        Self::read_prediction(response).await
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction, BackendError> {
        let response = self
            .client
            .get(self.prediction_url(id))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(network_error)?;

        Self::read_prediction(response).await
    }
}

fn network_error(e: reqwest::Error) -> BackendError {
    let message = if e.is_connect() {
        "Failed to connect to the Replicate API server. Check your internet connection.".to_string()
    } else if e.is_timeout() {
        "Request to Replicate timed out. The API server is not responding.".to_string()
    } else {
        format!("Replicate network error: {e}")
    };
    BackendError::Network(message)
}

/// Formats HTTP error codes into human-readable log lines.
fn describe_status(status: u16, body: &str) -> String {
    match status {
        401 => "Replicate API token is invalid or expired.".to_string(),
        402 => "Replicate account has no remaining credit.".to_string(),
        404 => "Replicate prediction or model version not found.".to_string(),
        422 => format!("Replicate rejected the prediction input: {body}"),
        429 => "Too many requests to Replicate. Rate limit hit.".to_string(),
        500 | 502 | 503 | 504 => "Replicate API server is experiencing issues.".to_string(),
        _ => format!("Replicate API error (status {status}): {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str) -> ReplicateBackend {
        let config = BackendConfig {
            base_url: base_url.to_string(),
            ..BackendConfig::default()
        };
        ReplicateBackend::new(&config, "secret".to_string()).unwrap()
    }

    #[test]
    fn test_urls_and_auth() {
        let backend = backend("https://api.replicate.com/v1/");
        assert_eq!(backend.predictions_url(), "https://api.replicate.com/v1/predictions");
        assert_eq!(
            backend.prediction_url("abc123"),
            "https://api.replicate.com/v1/predictions/abc123"
        );
        assert_eq!(
            backend.prediction_url("a/b"),
            "https://api.replicate.com/v1/predictions/a%2Fb"
        );
        assert_eq!(backend.auth_header(), "Token secret");
    }

    #[test]
    fn test_describe_status() {
        assert!(describe_status(401, "").contains("token"));
        assert!(describe_status(418, "teapot").contains("418"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Port 9 (discard) on localhost is closed on any sane test machine.
        let backend = backend("http://127.0.0.1:9");
        let result = backend.get_prediction("abc").await;
        assert!(matches!(result, Err(BackendError::Network(_))));
    }
}
