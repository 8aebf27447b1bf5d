//! Data model for reasoning queries, steps, traces and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::llm::{Provider, TokenUsage};
use crate::tools::{MathResult, Memory, SearchResult, ToolKind};

use super::MIN_STEPS;

fn default_max_steps() -> usize {
    10
}

fn default_enabled_tools() -> Vec<ToolKind> {
    ToolKind::ALL.to_vec()
}

fn default_confidence_threshold() -> f64 {
    0.7
}

/// Input to one reasoning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningQuery {
    /// The problem to answer; must not be blank
    pub problem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Free-form classification hint ("factual", "math", ...)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    /// Upper bound on the number of steps in the trace
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_enabled_tools")]
    pub enabled_tools: Vec<ToolKind>,
    /// The synthesis step must exceed this for the run to count as a success
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

impl ReasoningQuery {
    pub fn new(problem: impl Into<String>) -> Self {
        Self {
            problem: problem.into(),
            context: None,
            query_type: None,
            max_steps: default_max_steps(),
            enabled_tools: default_enabled_tools(),
            confidence_threshold: default_confidence_threshold(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_type(mut self, query_type: impl Into<String>) -> Self {
        self.query_type = Some(query_type.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_enabled_tools(mut self, tools: impl IntoIterator<Item = ToolKind>) -> Self {
        self.enabled_tools = tools.into_iter().collect();
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn is_enabled(&self, tool: ToolKind) -> bool {
        self.enabled_tools.contains(&tool)
    }

    /// Reject queries the pipeline cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.problem.trim().is_empty() {
            return Err(Error::invalid_query("problem must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::invalid_query(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.max_steps < MIN_STEPS {
            return Err(Error::invalid_query(format!(
                "max_steps must be at least {}, got {}",
                MIN_STEPS, self.max_steps
            )));
        }
        Ok(())
    }
}

/// Text produced by an LLM stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebOutput {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryOutput {
    pub memories: Vec<Memory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathOutput {
    pub success: bool,
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl From<MathResult> for MathOutput {
    fn from(r: MathResult) -> Self {
        Self {
            success: r.success,
            result: r.result,
            explanation: r.explanation,
        }
    }
}

/// Payload recorded by a step, tagged by the tool that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum StepOutput {
    Web(WebOutput),
    Memory(MemoryOutput),
    Math(MathOutput),
    Analysis(AnalysisOutput),
}

impl StepOutput {
    pub fn analysis(content: impl Into<String>) -> Self {
        Self::Analysis(AnalysisOutput {
            content: content.into(),
        })
    }

    /// The tool tag this payload belongs to.
    pub fn tool(&self) -> ToolKind {
        match self {
            Self::Web(_) => ToolKind::Web,
            Self::Memory(_) => ToolKind::Memory,
            Self::Math(_) => ToolKind::Math,
            Self::Analysis(_) => ToolKind::Analysis,
        }
    }

    /// Render the payload for inclusion in a prompt.
    pub fn render(&self) -> String {
        match self {
            Self::Analysis(a) => a.content.clone(),
            Self::Web(w) => serde_json::to_string(&w.results).unwrap_or_default(),
            Self::Memory(m) => serde_json::to_string(&m.memories).unwrap_or_default(),
            Self::Math(m) => serde_json::to_string(m).unwrap_or_default(),
        }
    }
}

/// Which backend answered an LLM stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub provider: Provider,
    pub model: String,
}

/// One entry of a reasoning trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// 1-based position in the trace, assigned when the step is recorded
    pub step_number: usize,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<ToolKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<StepOutput>,
    pub reasoning: String,
    pub confidence: f64,
    /// Wall-clock time spent in this step
    pub duration_ms: u64,
    /// Set only when the step partially failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl ReasoningStep {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            step_number: 0,
            description: description.into(),
            tool_used: None,
            tool_input: None,
            tool_output: None,
            reasoning: String::new(),
            confidence: 0.0,
            duration_ms: 0,
            errors: None,
            provenance: None,
        }
    }

    pub fn with_tool(mut self, tool: ToolKind) -> Self {
        self.tool_used = Some(tool);
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.tool_input = Some(input);
        self
    }

    pub fn with_output(mut self, output: StepOutput) -> Self {
        self.tool_output = Some(output);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Set the confidence, clamped to [0, 1].
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.get_or_insert_with(Vec::new).push(error.into());
        self
    }

    pub fn with_provenance(mut self, provider: Provider, model: impl Into<String>) -> Self {
        self.provenance = Some(Provenance {
            provider,
            model: model.into(),
        });
        self
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// The ordered record of one reasoning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub problem_id: Uuid,
    pub problem: String,
    pub steps: Vec<ReasoningStep>,
    pub final_answer: String,
    /// One line per step: `{n}. {description}: {reasoning}`
    pub reasoning: String,
    /// Distinct tools in order of first use
    pub tools_used: Vec<ToolKind>,
    pub success: bool,
    /// Mean of all step confidences
    pub confidence: f64,
    pub duration_ms: u64,
    /// Top-level failures only; step failures stay on their steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub token_usage: TokenUsage,
}

impl ReasoningTrace {
    /// Whether any step recorded a partial failure.
    pub fn has_step_errors(&self) -> bool {
        self.steps.iter().any(ReasoningStep::has_errors)
    }

    /// Steps that used `tool`.
    pub fn steps_for(&self, tool: ToolKind) -> impl Iterator<Item = &ReasoningStep> {
        self.steps
            .iter()
            .filter(move |s| s.tool_used == Some(tool))
    }

    /// The final synthesis step, if the run got that far.
    pub fn synthesis_step(&self) -> Option<&ReasoningStep> {
        self.steps
            .last()
            .filter(|s| s.description == super::engine::SYNTHESIS_DESCRIPTION)
    }
}

/// What `reason()` returns to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResponse {
    pub trace: ReasoningTrace,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Advisory notes; never affect `success`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl ReasoningResponse {
    /// Response for a run that reached finalization.
    pub fn completed(trace: ReasoningTrace, suggestions: Vec<String>) -> Self {
        Self {
            success: trace.success,
            trace,
            error: None,
            suggestions: (!suggestions.is_empty()).then_some(suggestions),
        }
    }

    /// Response for a run that ended in a pipeline failure.
    pub fn failed(trace: ReasoningTrace, error: &Error) -> Self {
        Self {
            trace,
            success: false,
            error: Some(error.to_string()),
            suggestions: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_defaults() {
        let query = ReasoningQuery::new("Why is the sky blue?");
        assert_eq!(query.max_steps, 10);
        assert_eq!(query.confidence_threshold, 0.7);
        assert!(ToolKind::ALL.iter().all(|t| query.is_enabled(*t)));
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_query_deserialize_defaults() {
        let query: ReasoningQuery =
            serde_json::from_value(json!({"problem": "What is 2+2?", "type": "math"})).unwrap();
        assert_eq!(query.query_type.as_deref(), Some("math"));
        assert_eq!(query.max_steps, 10);
        assert_eq!(query.enabled_tools.len(), 4);
    }

    #[test]
    fn test_query_validation() {
        assert!(ReasoningQuery::new("   ").validate().is_err());
        assert!(ReasoningQuery::new("ok")
            .with_confidence_threshold(1.2)
            .validate()
            .is_err());
        assert!(ReasoningQuery::new("ok").with_max_steps(2).validate().is_err());
        assert!(ReasoningQuery::new("ok").with_max_steps(3).validate().is_ok());
    }

    #[test]
    fn test_step_builder() {
        let step = ReasoningStep::new("Compute")
            .with_tool(ToolKind::Math)
            .with_confidence(1.7)
            .with_error("timeout")
            .with_error("retry skipped");

        assert_eq!(step.confidence, 1.0);
        assert!(step.has_errors());
        assert_eq!(step.errors.as_ref().unwrap().len(), 2);
        assert!(!ReasoningStep::new("ok").has_errors());
    }

    #[test]
    fn test_step_output_is_tagged() {
        let output = StepOutput::Math(MathResult::exact(4).into());
        assert_eq!(output.tool(), ToolKind::Math);

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["kind"], "math");
        assert_eq!(json["data"]["result"], 4);

        let back: StepOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back, output);
    }

    #[test]
    fn test_render_web_output() {
        let output = StepOutput::Web(WebOutput {
            results: vec![SearchResult::new("Rust", "https://rust-lang.org")],
        });
        assert!(output.render().contains("https://rust-lang.org"));
        assert_eq!(StepOutput::analysis("plain").render(), "plain");
    }
}
