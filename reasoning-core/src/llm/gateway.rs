//! Language model gateway with ordered provider fallback.
//!
//! Every pipeline stage talks to the model through [`LanguageModelGateway`];
//! none of them hold a provider client directly. [`FallbackGateway`] walks an
//! ordered backend list once per call and returns the first answer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::error::{Error, ProviderAttempt, Result};

use super::client::{ClientConfig, LLMClient, OpenAICompatibleClient};
use super::types::{ChatMessage, ChatOptions, ChatOutcome, ChatRole, CompletionRequest};

/// Chat-style access to a language model.
#[async_trait]
pub trait LanguageModelGateway: Send + Sync {
    /// Send a conversation and return the assistant message.
    ///
    /// Fails with [`Error::ProviderExhausted`] only when no backend answered.
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<ChatOutcome>;
}

/// A backend in the fallback chain.
#[derive(Clone)]
pub struct Backend {
    client: Arc<dyn LLMClient>,
    model: Option<String>,
}

impl Backend {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self {
            client,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn resolve_model(&self, options: &ChatOptions) -> String {
        options
            .model
            .clone()
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| self.client.default_model())
    }
}

/// Gateway that tries each backend in order until one succeeds.
///
/// No backend is retried within a call. The gateway holds no mutable state
/// and can be shared across concurrent runs.
#[derive(Clone)]
pub struct FallbackGateway {
    backends: Vec<Backend>,
    timeout: Duration,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

impl FallbackGateway {
    /// Create an empty gateway with the given per-attempt timeout.
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            backends: Vec::new(),
            timeout: Duration::from_millis(timeout_ms),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Build one HTTP backend per configured provider, in configuration order.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let mut gateway = Self::new(config.timeout_ms)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);

        for entry in &config.providers {
            let mut client_config = ClientConfig::new(entry.provider)
                .with_default_model(entry.model())
                .with_timeout_ms(config.timeout_ms);
            if let Some(url) = &entry.base_url {
                client_config = client_config.with_base_url(url);
            }
            if let Some(key) = entry.resolve_api_key() {
                client_config = client_config.with_api_key(key);
            }
            let client = OpenAICompatibleClient::new(client_config)?;
            gateway = gateway.with_backend(Backend::new(Arc::new(client)));
        }

        Ok(gateway)
    }

    /// Append a backend to the end of the chain.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backends.push(backend);
        self
    }

    /// Append a client with its default model.
    pub fn with_client(self, client: Arc<dyn LLMClient>) -> Self {
        self.with_backend(Backend::new(client))
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Number of configured backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Backends in the order they will be tried for `options`.
    ///
    /// A preferred provider moves its backends to the front; the rest keep
    /// their configured order.
    fn attempt_order(&self, options: &ChatOptions) -> Vec<&Backend> {
        match options.provider {
            Some(preferred) => {
                let (mut first, rest): (Vec<&Backend>, Vec<&Backend>) = self
                    .backends
                    .iter()
                    .partition(|b| b.client.provider() == preferred);
                first.extend(rest);
                first
            }
            None => self.backends.iter().collect(),
        }
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        model: String,
        options: &ChatOptions,
    ) -> CompletionRequest {
        let mut request = CompletionRequest::new()
            .with_model(model)
            .with_messages(messages.to_vec());
        if let Some(temperature) = options.temperature.or(self.temperature) {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = options.max_tokens.or(self.max_tokens) {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

#[async_trait]
impl LanguageModelGateway for FallbackGateway {
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<ChatOutcome> {
        let mut attempts = Vec::new();

        for backend in self.attempt_order(&options) {
            let provider = backend.client.provider();
            let model = backend.resolve_model(&options);
            let request = self.build_request(&messages, model.clone(), &options);

            let result = tokio::time::timeout(self.timeout, backend.client.complete(request))
                .await
                .unwrap_or_else(|_| Err(Error::timeout(self.timeout.as_millis() as u64)));

            match result {
                Ok(response) => {
                    debug!(%provider, model = %response.model, "provider answered");
                    return Ok(ChatOutcome {
                        message: ChatMessage {
                            role: ChatRole::Assistant,
                            content: response.content,
                        },
                        provider_used: provider,
                        model_used: response.model,
                        usage: response.usage,
                    });
                }
                Err(e) => {
                    warn!(%provider, %model, error = %e, "provider failed, falling back");
                    attempts.push(ProviderAttempt {
                        provider,
                        model,
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(Error::ProviderExhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, Provider, TokenUsage};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock backend that either answers, fails, or stalls.
    struct MockClient {
        provider: Provider,
        reply: Option<String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        last_model: std::sync::Mutex<Option<String>>,
    }

    impl MockClient {
        fn answering(provider: Provider, reply: &str) -> Self {
            Self {
                provider,
                reply: Some(reply.to_string()),
                delay: None,
                calls: AtomicUsize::new(0),
                last_model: std::sync::Mutex::new(None),
            }
        }

        fn failing(provider: Provider) -> Self {
            Self {
                reply: None,
                ..Self::answering(provider, "")
            }
        }

        fn slow(provider: Provider, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::answering(provider, "too late")
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LLMClient for MockClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_model.lock().unwrap() = request.model.clone();
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Some(reply) => Ok(CompletionResponse {
                    id: "test".to_string(),
                    model: request.model.unwrap_or_default(),
                    content: reply.clone(),
                    usage: TokenUsage {
                        input_tokens: 10,
                        output_tokens: 2,
                    },
                    timestamp: Utc::now(),
                }),
                None => Err(Error::llm_api(self.provider, "503 Service Unavailable")),
            }
        }

        fn provider(&self) -> Provider {
            self.provider
        }
    }

    #[tokio::test]
    async fn test_first_provider_answers() {
        let first = Arc::new(MockClient::answering(Provider::Ollama, "local"));
        let second = Arc::new(MockClient::answering(Provider::OpenAI, "cloud"));
        let gateway = FallbackGateway::new(1_000)
            .with_client(first.clone())
            .with_client(second.clone());

        let outcome = gateway
            .chat(vec![ChatMessage::user("hi")], ChatOptions::new())
            .await
            .unwrap();

        assert_eq!(outcome.message.content, "local");
        assert_eq!(outcome.provider_used, Provider::Ollama);
        assert_eq!(outcome.model_used, "llama3.2");
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_provider() {
        let first = Arc::new(MockClient::failing(Provider::Ollama));
        let second = Arc::new(MockClient::answering(Provider::DeepSeek, "fallback"));
        let gateway = FallbackGateway::new(1_000)
            .with_client(first.clone())
            .with_client(second.clone());

        let outcome = gateway
            .chat(vec![ChatMessage::user("hi")], ChatOptions::new())
            .await
            .unwrap();

        assert_eq!(outcome.message.content, "fallback");
        assert_eq!(outcome.provider_used, Provider::DeepSeek);
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let first = Arc::new(MockClient::failing(Provider::Ollama));
        let second = Arc::new(MockClient::failing(Provider::Google));
        let gateway = FallbackGateway::new(1_000)
            .with_client(first.clone())
            .with_client(second.clone());

        let err = gateway
            .chat(vec![ChatMessage::user("hi")], ChatOptions::new())
            .await
            .unwrap_err();

        match err {
            Error::ProviderExhausted { attempts } => {
                let providers: Vec<Provider> = attempts.iter().map(|a| a.provider).collect();
                assert_eq!(providers, vec![Provider::Ollama, Provider::Google]);
            }
            other => panic!("expected ProviderExhausted, got {:?}", other),
        }
        // Never retried within one call
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_gateway_is_exhausted() {
        let gateway = FallbackGateway::new(1_000);
        assert!(gateway.is_empty());

        let err = gateway
            .chat(vec![ChatMessage::user("hi")], ChatOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderExhausted { ref attempts } if attempts.is_empty()));
    }

    #[tokio::test]
    async fn test_preferred_provider_tried_first() {
        let first = Arc::new(MockClient::answering(Provider::Ollama, "local"));
        let second = Arc::new(MockClient::answering(Provider::OpenAI, "cloud"));
        let gateway = FallbackGateway::new(1_000)
            .with_client(first.clone())
            .with_client(second.clone());

        let outcome = gateway
            .chat(
                vec![ChatMessage::user("hi")],
                ChatOptions::new().with_provider(Provider::OpenAI),
            )
            .await
            .unwrap();

        assert_eq!(outcome.provider_used, Provider::OpenAI);
        assert_eq!(first.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_override_precedence() {
        let client = Arc::new(MockClient::answering(Provider::OpenAI, "ok"));
        let gateway = FallbackGateway::new(1_000)
            .with_backend(Backend::new(client.clone()).with_model("gpt-4o"));

        gateway
            .chat(vec![ChatMessage::user("hi")], ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(client.last_model.lock().unwrap().as_deref(), Some("gpt-4o"));

        gateway
            .chat(
                vec![ChatMessage::user("hi")],
                ChatOptions::new().with_model("o3-mini"),
            )
            .await
            .unwrap();
        assert_eq!(client.last_model.lock().unwrap().as_deref(), Some("o3-mini"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_and_falls_back() {
        let slow = Arc::new(MockClient::slow(Provider::Ollama, Duration::from_secs(60)));
        let fast = Arc::new(MockClient::answering(Provider::OpenAI, "in time"));
        let gateway = FallbackGateway::new(500)
            .with_client(slow.clone())
            .with_client(fast.clone());

        let outcome = gateway
            .chat(vec![ChatMessage::user("hi")], ChatOptions::new())
            .await
            .unwrap();

        assert_eq!(outcome.message.content, "in time");
        assert_eq!(outcome.provider_used, Provider::OpenAI);
    }

    #[test]
    fn test_from_config_preserves_order() {
        let config = ModelConfig::default();
        let gateway = FallbackGateway::from_config(&config).unwrap();
        let providers: Vec<Provider> = gateway
            .attempt_order(&ChatOptions::new())
            .iter()
            .map(|b| b.client.provider())
            .collect();
        assert_eq!(
            providers,
            vec![
                Provider::Ollama,
                Provider::DeepSeek,
                Provider::Google,
                Provider::OpenAI
            ]
        );
    }
}
