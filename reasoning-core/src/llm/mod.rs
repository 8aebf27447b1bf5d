//! Language model access with ordered provider fallback.
//!
//! Pipeline stages depend only on [`LanguageModelGateway`]. The bundled
//! [`FallbackGateway`] tries each configured backend once per call, in order,
//! and reports which provider and model produced the answer.
//!
//! ## Example
//!
//! ```rust,ignore
//! use reasoning_core::llm::{ChatMessage, ChatOptions, FallbackGateway, LanguageModelGateway};
//! use reasoning_core::ModelConfig;
//!
//! let gateway = FallbackGateway::from_config(&ModelConfig::default())?;
//! let outcome = gateway
//!     .chat(vec![ChatMessage::user("Hello")], ChatOptions::new())
//!     .await?;
//! println!("{} answered: {}", outcome.provider_used, outcome.message.content);
//! ```

mod client;
mod gateway;
mod types;

pub use client::{ClientConfig, LLMClient, OpenAICompatibleClient};
pub use gateway::{Backend, FallbackGateway, LanguageModelGateway};
pub use types::{
    ChatMessage, ChatOptions, ChatOutcome, ChatRole, CompletionRequest, CompletionResponse,
    Provider, TokenUsage,
};
