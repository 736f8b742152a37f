use std::time::Duration;

use reqwest::Client;
use roster_core::error::AppError;
use roster_core::models::EntityPrediction;
use roster_core::traits::InferenceClient;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";
const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(20);

/// Client for a Hugging Face style token-classification endpoint.
///
/// Sends `POST {base_url}/models/{model}` with a bearer token and expects an
/// array of entity spans back.
#[derive(Clone)]
pub struct HfInferenceClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl HfInferenceClient {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, base_url, DEFAULT_INFERENCE_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(&self.api_key, &self.base_url, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }
}

// ---- Inference API types ----

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: Parameters,
}

#[derive(Serialize)]
struct Parameters {
    aggregation_strategy: &'static str,
}

/// Single inputs come back flat; some deployments wrap them in a batch.
#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Flat(Vec<EntityPrediction>),
    Batched(Vec<Vec<EntityPrediction>>),
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

impl InferenceClient for HfInferenceClient {
    async fn infer(&self, model: &str, text: &str) -> Result<Vec<EntityPrediction>, AppError> {
        let url = format!("{}/models/{}", self.base_url, model);

        let request = InferenceRequest {
            inputs: text,
            parameters: Parameters {
                aggregation_strategy: "simple",
            },
        };

        tracing::debug!(%model, chars = text.len(), "Calling inference endpoint");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_ms)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {}", e))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();

            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status_code, body));

            if is_permission_error(status_code, &message) {
                return Err(AppError::PermissionDenied(format!("{model}: {message}")));
            }

            return Err(AppError::InferenceError {
                message,
                status_code,
                retryable: status_code == 429 || status_code >= 500,
            });
        }

        let parsed: InferenceResponse = response.json().await.map_err(|e| {
            AppError::HttpError(format!("Failed to parse inference response: {}", e))
        })?;

        Ok(match parsed {
            InferenceResponse::Flat(predictions) => predictions,
            InferenceResponse::Batched(batches) => batches.into_iter().flatten().collect(),
        })
    }
}

/// 401/403, or an error body that talks about permissions.
fn is_permission_error(status_code: u16, message: &str) -> bool {
    if status_code == 401 || status_code == 403 {
        return true;
    }
    let lower = message.to_lowercase();
    lower.contains("permission") || lower.contains("authoriz")
}
