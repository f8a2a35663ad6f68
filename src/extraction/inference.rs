//! Inference service client
//!
//! Batch enrichment calls to the external inference HTTP API. The contract
//! is order-preserving and one-to-one: the response carries exactly one
//! result entry per input text. Enforcement of that contract lives in the
//! extraction job; this module only transports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

use crate::config::InferenceConfig;

/// Inference client error types
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Request(String),
    #[error("inference service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode inference response: {0}")]
    Decode(String),
}

/// Per-message inference result: zero or more candidate property payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageInference {
    /// Candidate property extractions, raw as returned by the service
    #[serde(default)]
    pub properties: Vec<JsonValue>,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    results: Vec<MessageInference>,
}

/// Capability interface for batch enrichment.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Send all texts in one request; the response must contain one result
    /// per input text, in the same order.
    async fn batch_infer(&self, texts: &[String]) -> Result<Vec<MessageInference>, InferenceError>;
}

/// HTTP implementation backed by the configured inference endpoint.
pub struct HttpInferenceClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpInferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn batch_infer(&self, texts: &[String]) -> Result<Vec<MessageInference>, InferenceError> {
        let mut request = self.http.post(&self.endpoint).json(&BatchRequest { texts });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(200).collect();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: truncated,
            });
        }

        let parsed: BatchResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Decode(e.to_string()))?;

        Ok(parsed.results)
    }
}
