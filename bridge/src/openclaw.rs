//! HTTP client for the local OpenClaw agent
//!
//! OpenClaw exposes an OpenAI-compatible surface: `GET /v1/models` for health and
//! `POST /v1/chat/completions` for queries. The client lives behind the [`Gateway`]
//! trait so the relay loop can be exercised without a live agent.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BridgeConfig;

/// Timeout for a single health probe
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// How much of an error body to keep in messages
const BODY_SNIPPET: usize = 500;

/// Errors from talking to the local OpenClaw agent
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection-level failure: the agent is not listening at all
    #[error("cannot connect to OpenClaw at {0}")]
    Unreachable(String),

    /// The agent answered with a non-success HTTP status
    #[error("OpenClaw returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request failed in transit (timeout, reset, bad response body)
    #[error("request to OpenClaw failed: {0}")]
    Request(String),
}

/// Interface to the local agent
#[async_trait]
pub trait Gateway: Send + Sync {
    /// True iff the agent answers its health endpoint with HTTP 200
    async fn health_check(&self) -> bool;

    /// Send a single user query and return the assistant's reply text
    async fn query(&self, user_query: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

/// Thin wrapper around the OpenClaw HTTP API
pub struct OpenClawClient {
    base_url: String,
    token: String,
    agent_id: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenClawClient {
    pub fn new(base_url: &str, token: &str, agent_id: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            agent_id: agent_id.to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            &config.openclaw_url,
            &config.openclaw_token,
            &config.openclaw_agent_id,
            Duration::from_secs(config.request_timeout),
        )
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            req
        } else {
            req.bearer_auth(&self.token)
        }
    }
}

#[async_trait]
impl Gateway for OpenClawClient {
    async fn health_check(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        let req = self.authorized(self.client.get(&url)).timeout(HEALTH_TIMEOUT);
        match req.send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }

    async fn query(&self, user_query: &str) -> Result<String, GatewayError> {
        let payload = ChatRequest {
            model: format!("openclaw:{}", self.agent_id),
            messages: vec![ChatMessage {
                role: "user",
                content: user_query.to_string(),
            }],
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let req = self
            .authorized(self.client.post(&url))
            .timeout(self.timeout)
            .json(&payload);

        let resp = req.send().await.map_err(|e| {
            if e.is_connect() {
                GatewayError::Unreachable(self.base_url.clone())
            } else {
                GatewayError::Request(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: body.chars().take(BODY_SNIPPET).collect(),
            });
        }

        let data: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        match data.choices.into_iter().next() {
            Some(choice) => Ok(choice.message.content),
            None => Ok("[OpenClaw] No response choices returned.".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_completion_reply() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "hello"}}
            ]
        }"#;
        let resp: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.choices[0].message.content, "hello");
    }

    #[test]
    fn tolerates_empty_choices() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(resp.choices.is_empty());
        let resp: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.choices.is_empty());
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let client = OpenClawClient::new(
            "http://localhost:18789/",
            "",
            "main",
            Duration::from_secs(5),
        );
        assert_eq!(client.base_url, "http://localhost:18789");
    }

    #[test]
    fn unreachable_error_names_the_agent() {
        let err = GatewayError::Unreachable("http://localhost:18789".to_string());
        assert!(err.to_string().contains("cannot connect to OpenClaw"));
    }
}
