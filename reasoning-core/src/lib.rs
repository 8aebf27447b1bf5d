//! # reasoning-core
//!
//! A multi-step reasoning engine that answers a problem by analyzing it,
//! planning an approach, consulting auxiliary tools, and synthesizing a final
//! answer, while recording an auditable trace of every step.
//!
//! ## Core Components
//!
//! - **LLM**: Provider clients and the fallback [`LanguageModelGateway`]
//! - **Tools**: Web search, memory recall and math evaluation adapters
//! - **Router**: Keyword rule table deciding which tools a problem needs
//! - **Reasoning**: The staged pipeline, trace recording and suggestions
//!
//! ## Example
//!
//! ```rust,ignore
//! use reasoning_core::{ModelConfig, ReasoningEngine, ReasoningQuery, ToolKind};
//!
//! let engine = ReasoningEngine::from_config(ModelConfig::default())?;
//! let query = ReasoningQuery::new("What is the latest stable Rust release?")
//!     .with_enabled_tools([ToolKind::Web]);
//!
//! let response = engine.reason(query).await;
//! if !response.success {
//!     for suggestion in response.suggestions.unwrap_or_default() {
//!         println!("hint: {}", suggestion);
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod llm;
pub mod reasoning;
pub mod router;
pub mod tools;

// Re-exports for convenience
pub use config::{ModelConfig, ProviderConfig};
pub use error::{Error, ProviderAttempt, Result};
pub use llm::{
    Backend, ChatMessage, ChatOptions, ChatOutcome, ChatRole, ClientConfig, CompletionRequest,
    CompletionResponse, FallbackGateway, LLMClient, LanguageModelGateway, OpenAICompatibleClient,
    Provider, TokenUsage,
};
pub use reasoning::{
    suggest, Provenance, ReasoningEngine, ReasoningQuery, ReasoningResponse, ReasoningStep,
    ReasoningTrace, StepOutput, TraceRecorder, FALLBACK_ANSWER, MIN_STEPS,
};
pub use router::{ToolRouter, ToolRule};
pub use tools::{
    MathRequest, MathResult, MathTool, Memory, MemoryQuery, MemoryTool, SearchResult, ToolKind,
    WebTool,
};
