//! OpenAI-compatible chat completion client

use super::{ChatMessage, CompletionRequest, LlmGateway, ResponseFormat};
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Chat completion client for the OpenAI API (or a compatible endpoint)
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
}

#[derive(Serialize)]
struct WireResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new client. No request timeout is applied unless one is configured.
    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| AppError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            response_format: match request.response_format {
                ResponseFormat::JsonObject => Some(WireResponseFormat { kind: "json_object" }),
                ResponseFormat::Text => None,
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::llm(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::llm(format!("API error {}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::llm(format!("Failed to parse response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::llm("Response contained no choices"))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl LlmGateway for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let start = Instant::now();
        let result = self.send(&request).await;
        let elapsed = start.elapsed().as_secs_f64();

        metrics::record_llm_call(elapsed, request.operation, &self.model, result.is_ok());

        match &result {
            Ok(content) => debug!(
                operation = request.operation,
                duration_ms = elapsed * 1000.0,
                content_len = content.len(),
                "LLM completion succeeded"
            ),
            Err(e) => warn!(
                operation = request.operation,
                duration_ms = elapsed * 1000.0,
                error = %e,
                "LLM completion failed"
            ),
        }

        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
