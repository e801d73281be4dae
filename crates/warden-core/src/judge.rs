//! Chat-completions client for the judgment stage.
//!
//! Live mode calls the Azure OpenAI chat deployment with deterministic
//! decoding (temperature 0.0) and no streaming, one blocking call per
//! audit. Mock mode returns a canned response so pipeline behavior can be
//! exercised without network access.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::config::{ConfigError, OpenAiConfig};

const REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_COMPLETION_TOKENS: u32 = 2048;

#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("model invocation failed (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("model response carried no choices")]
    EmptyResponse,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// OpenAI-compatible request/response structures.
#[derive(Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
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
    content: String,
}

/// Mock (canned response) or live API invocation.
pub enum JudgeMode {
    /// Returns the carried string without touching the network.
    Mock(String),
    Live,
}

/// Single-call judgment model client.
pub struct ChatJudge {
    mode: JudgeMode,
    client: reqwest::Client,
}

impl ChatJudge {
    /// Live client against the configured Azure OpenAI chat deployment.
    pub fn live() -> Self {
        Self::with_mode(JudgeMode::Live)
    }

    /// Test double: every invocation yields `canned`.
    pub fn mock(canned: impl Into<String>) -> Self {
        Self::with_mode(JudgeMode::Mock(canned.into()))
    }

    pub fn with_mode(mode: JudgeMode) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { mode, client }
    }

    /// One blocking chat-completion call: `[system, user]`, temperature 0.0,
    /// no streaming. Returns the raw response text for the verdict parser.
    pub async fn invoke(&self, system_prompt: &str, user_message: &str) -> Result<String, JudgeError> {
        match &self.mode {
            JudgeMode::Mock(canned) => Ok(canned.clone()),
            JudgeMode::Live => self.invoke_live(system_prompt, user_message).await,
        }
    }

    async fn invoke_live(&self, system_prompt: &str, user_message: &str) -> Result<String, JudgeError> {
        let config = OpenAiConfig::from_env()?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            config.endpoint.trim_end_matches('/'),
            config.chat_deployment,
            config.api_version
        );

        let request_body = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
            temperature: 0.0,
            max_tokens: MAX_COMPLETION_TOKENS,
            stream: None,
        };

        info!(
            deployment = %config.chat_deployment,
            system_len = system_prompt.len(),
            user_len = user_message.len(),
            "dispatching judgment request"
        );

        let response = self
            .client
            .post(&url)
            .header("api-key", &config.api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(JudgeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(JudgeError::EmptyResponse)?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_mode_returns_canned_response() {
        let judge = ChatJudge::mock("{\"status\":\"PASS\"}");
        let out = judge.invoke("system", "user").await.expect("mock invoke");
        assert_eq!(out, "{\"status\":\"PASS\"}");
        // Deterministic across calls.
        let again = judge.invoke("system", "user").await.expect("mock invoke");
        assert_eq!(out, again);
    }
}
