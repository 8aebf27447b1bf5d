//! LLM client trait and the OpenAI-compatible backend.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use crate::error::{Error, Result};

use super::types::{CompletionRequest, CompletionResponse, Provider, TokenUsage};

/// A single language-model backend.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Complete a conversation.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider for this client.
    fn provider(&self) -> Provider;

    /// Model used when a request does not name one.
    fn default_model(&self) -> String {
        self.provider().default_model().to_string()
    }
}

/// Configuration for one backend client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub provider: Provider,
    /// API key, if the provider requires one
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    /// Default model
    pub default_model: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            api_key: None,
            base_url: None,
            default_model: None,
            timeout_ms: 30_000,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

fn build_http_client(timeout_ms: u64) -> Result<Client> {
    let timeout = Duration::from_millis(timeout_ms);

    // Some sandboxed macOS environments can panic during proxy auto-detection
    // in reqwest's default client builder. Fall back to no-proxy in that case.
    match catch_unwind(AssertUnwindSafe(|| {
        Client::builder().timeout(timeout).build()
    })) {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(_)) | Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e))),
    }
}

/// Client for any provider speaking the `/chat/completions` dialect.
pub struct OpenAICompatibleClient {
    config: ClientConfig,
    http: Client,
}

impl OpenAICompatibleClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(config.timeout_ms)?;
        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.config.provider.default_base_url())
            .trim_end_matches('/')
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let provider = self.config.provider;
        let model = request.model.unwrap_or_else(|| self.default_model());

        let api_request = ChatCompletionRequest {
            model: model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url());
        let mut builder = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&api_request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::llm_api(provider, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::llm_api(provider, format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<WireError>(&body) {
                return Err(Error::llm_api(
                    provider,
                    format!("{} ({})", error.error.message, status),
                ));
            }
            return Err(Error::llm_api(provider, format!("{}: {}", status, body)));
        }

        let api_response: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| Error::llm_api(provider, format!("Failed to parse response: {}", e)))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::llm_api(provider, "Response contained no content"))?;

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: api_response
                .id
                .unwrap_or_else(|| format!("{}-{}", provider, Utc::now().timestamp_millis())),
            model: api_response.model.unwrap_or(model),
            content,
            usage,
            timestamp: Utc::now(),
        })
    }

    fn provider(&self) -> Provider {
        self.config.provider
    }

    fn default_model(&self) -> String {
        self.config
            .default_model
            .clone()
            .unwrap_or_else(|| self.config.provider.default_model().to_string())
    }
}
