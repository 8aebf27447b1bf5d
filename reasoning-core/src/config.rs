//! Process-wide model configuration.
//!
//! `ModelConfig` is read-only for the lifetime of a reasoning run. It can be
//! built in code, deserialized from JSON, or assembled from `REASONING_*`
//! environment variables.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::llm::Provider;

/// One entry of the provider fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    /// Model override; the provider default is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// API key; falls back to the provider's environment variable when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            model: None,
            base_url: None,
            api_key: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Model this entry resolves to.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// API key from the entry itself or from the provider's environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.provider
                .api_key_env()
                .and_then(|var| std::env::var(var).ok())
        })
    }
}

/// Configuration shared by every reasoning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Ordered provider fallback chain
    pub providers: Vec<ProviderConfig>,
    /// Default bound on the number of steps in one trace
    pub max_steps: usize,
    /// Default success threshold for the synthesis step
    pub confidence_threshold: f64,
    /// Deadline for every external call, in milliseconds
    pub timeout_ms: u64,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderConfig::new(Provider::Ollama),
                ProviderConfig::new(Provider::DeepSeek),
                ProviderConfig::new(Provider::Google),
                ProviderConfig::new(Provider::OpenAI),
            ],
            max_steps: 10,
            confidence_threshold: 0.7,
            timeout_ms: 30_000,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

impl ModelConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_providers(mut self, providers: Vec<ProviderConfig>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from environment variables.
    ///
    /// Unset variables keep their defaults. `REASONING_PROVIDERS` is a comma
    /// separated list such as `ollama,openai`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(list) = std::env::var("REASONING_PROVIDERS") {
            config.providers = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<Provider>().map(ProviderConfig::new))
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(v) = env_parse("REASONING_MAX_STEPS")? {
            config.max_steps = v;
        }
        if let Some(v) = env_parse("REASONING_CONFIDENCE_THRESHOLD")? {
            config.confidence_threshold = v;
        }
        if let Some(v) = env_parse("REASONING_TIMEOUT_MS")? {
            config.timeout_ms = v;
        }
        if let Some(v) = env_parse("REASONING_TEMPERATURE")? {
            config.temperature = v;
        }
        if let Some(v) = env_parse("REASONING_MAX_TOKENS")? {
            config.max_tokens = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be positive".to_string()));
        }
        if self.max_steps < crate::reasoning::MIN_STEPS {
            return Err(Error::Config(format!(
                "max_steps must be at least {}, got {}",
                crate::reasoning::MIN_STEPS,
                self.max_steps
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", var, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.providers[0].provider, Provider::Ollama);
        assert_eq!(config.providers.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ModelConfig::new()
            .with_providers(vec![ProviderConfig::new(Provider::OpenAI).with_model("gpt-4o")])
            .with_timeout_ms(1_000)
            .with_max_steps(6)
            .with_confidence_threshold(0.5);

        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].model(), "gpt-4o");
        assert_eq!(config.timeout_ms, 1_000);
        assert_eq!(config.max_steps, 6);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = ModelConfig::from_json(
            r#"{"providers": [{"provider": "deepseek"}], "timeout_ms": 5000}"#,
        )
        .unwrap();

        assert_eq!(config.providers[0].provider, Provider::DeepSeek);
        assert_eq!(config.providers[0].model(), "deepseek-chat");
        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.max_steps, 10);
    }

    #[test]
    fn test_from_json_rejects_bad_threshold() {
        let err = ModelConfig::from_json(r#"{"confidence_threshold": 1.5}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_min_steps() {
        let config = ModelConfig::new().with_max_steps(2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let entry = ProviderConfig::new(Provider::OpenAI).with_api_key("sk-test");
        assert_eq!(entry.resolve_api_key(), Some("sk-test".to_string()));
    }
}
