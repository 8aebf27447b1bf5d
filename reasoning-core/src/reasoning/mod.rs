//! Multi-step reasoning over an LLM gateway and auxiliary tools.
//!
//! [`ReasoningEngine`] turns a [`ReasoningQuery`] into a [`ReasoningResponse`]
//! whose [`ReasoningTrace`] records every step: analysis, planning, each
//! routed tool call, and the final synthesis.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reasoning_core::{FallbackGateway, ModelConfig, ReasoningEngine, ReasoningQuery};
//!
//! let config = ModelConfig::from_env()?;
//! let engine = ReasoningEngine::from_config(config)?
//!     .with_math_tool(Arc::new(my_math_service));
//!
//! let response = engine.reason(ReasoningQuery::new("What is 2+2?")).await;
//! println!("{} ({:.0}%)", response.trace.final_answer, response.trace.confidence * 100.0);
//! for step in &response.trace.steps {
//!     println!("{}. {} [{:.2}]", step.step_number, step.description, step.confidence);
//! }
//! ```

mod engine;
pub mod prompts;
mod proptest;
mod suggestions;
mod trace;
mod types;

/// Analysis, plan and synthesis always run, so no trace is shorter than this.
pub const MIN_STEPS: usize = 3;

pub use engine::{ReasoningEngine, DEFAULT_MAX_RESULTS, FALLBACK_ANSWER, SYNTHESIS_DESCRIPTION};
pub use suggestions::{suggest, LOW_CONFIDENCE};
pub use trace::{distinct_tools, explain, mean_confidence, TraceRecorder};
pub use types::{
    AnalysisOutput, MathOutput, MemoryOutput, Provenance, ReasoningQuery, ReasoningResponse,
    ReasoningStep, ReasoningTrace, StepOutput, WebOutput,
};
