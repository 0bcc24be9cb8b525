//! Completion-model client with schema-constrained structured output.
//!
//! The six generation tasks differ only in prompt and target schema, never
//! in transport: one messages-API call per attempt, with the response
//! forced through a tool whose input schema is the task's response schema.
//! The returned value is the raw structured payload; structural validation
//! against the task's typed artifact stays task-local.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use recast_core::step_error::StepError;

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2048;
/// Tool name the model is forced to answer through.
const OUTPUT_TOOL: &str = "emit_result";

/// Generation-model collaborator interface: one schema-constrained call.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        response_schema: &serde_json::Value,
    ) -> Result<serde_json::Value, StepError>;
}

pub struct StructuredCompletionClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl StructuredCompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client for completion API")?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl CompletionClient for StructuredCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        response_schema: &serde_json::Value,
    ) -> Result<serde_json::Value, StepError> {
        let url = format!("{}/v1/messages", self.base_url);

        let request_body = json!({
            "model": self.model,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "tools": [{
                "name": OUTPUT_TOOL,
                "description": "Record the generated content in the required structure.",
                "input_schema": response_schema,
            }],
            "tool_choice": { "type": "tool", "name": OUTPUT_TOOL },
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                StepError::recoverable(anyhow::anyhow!("Completion request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let err = anyhow::anyhow!("Completion call failed: {} - {}", status, error_text);
            // Rate limits and server-side faults are worth retrying;
            // a rejected request will not improve on replay.
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(StepError::recoverable(err))
            } else {
                Err(StepError::unrecoverable(err))
            };
        }

        let body: MessagesResponse = response.json().await.map_err(|e| {
            StepError::recoverable(anyhow::anyhow!("Failed to parse completion response: {}", e))
        })?;

        body.content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::ToolUse { input, .. } => Some(input),
                _ => None,
            })
            .ok_or_else(|| {
                StepError::recoverable(anyhow::anyhow!(
                    "Completion response contained no structured tool output"
                ))
            })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        #[allow(dead_code)]
        text: String,
    },
    ToolUse {
        #[allow(dead_code)]
        name: String,
        input: serde_json::Value,
    },
}
