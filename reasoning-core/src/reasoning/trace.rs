//! Append-only trace recording and finalization.
//!
//! [`TraceRecorder`] owns the steps of one run. Step numbers are assigned at
//! append time from the current length, so `steps[i].step_number == i + 1`
//! holds for every trace it produces.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::llm::TokenUsage;
use crate::tools::ToolKind;

use super::types::{ReasoningStep, ReasoningTrace};

/// Mutable builder for a single run's trace.
#[derive(Debug)]
pub struct TraceRecorder {
    problem_id: Uuid,
    problem: String,
    created_at: DateTime<Utc>,
    started: Instant,
    steps: Vec<ReasoningStep>,
    usage: TokenUsage,
}

impl TraceRecorder {
    /// Start a trace with a fresh problem id.
    pub fn new(problem: impl Into<String>) -> Self {
        Self {
            problem_id: Uuid::new_v4(),
            problem: problem.into(),
            created_at: Utc::now(),
            started: Instant::now(),
            steps: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    pub fn problem_id(&self) -> Uuid {
        self.problem_id
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a step, assigning the next step number. Returns that number.
    pub fn record(&mut self, mut step: ReasoningStep) -> usize {
        step.step_number = self.steps.len() + 1;
        debug!(
            problem_id = %self.problem_id,
            step = step.step_number,
            description = %step.description,
            confidence = step.confidence,
            duration_ms = step.duration_ms,
            failed = step.has_errors(),
            "recorded reasoning step"
        );
        let number = step.step_number;
        self.steps.push(step);
        number
    }

    /// Add token usage reported by the gateway.
    pub fn add_usage(&mut self, usage: &TokenUsage) {
        self.usage.add(usage);
    }

    /// Close a run that reached synthesis.
    ///
    /// Success depends only on the last (synthesis) step's confidence.
    pub fn finish(self, final_answer: impl Into<String>, threshold: f64) -> ReasoningTrace {
        let success = self
            .steps
            .last()
            .is_some_and(|synthesis| synthesis.confidence > threshold);
        self.into_trace(final_answer.into(), success, None)
    }

    /// Close a run that ended in a pipeline failure, keeping any steps so far.
    pub fn fail(self, error: impl Into<String>) -> ReasoningTrace {
        self.into_trace(String::new(), false, Some(vec![error.into()]))
    }

    fn into_trace(
        self,
        final_answer: String,
        success: bool,
        errors: Option<Vec<String>>,
    ) -> ReasoningTrace {
        ReasoningTrace {
            problem_id: self.problem_id,
            problem: self.problem,
            final_answer,
            reasoning: explain(&self.steps),
            tools_used: distinct_tools(&self.steps),
            success,
            confidence: mean_confidence(&self.steps),
            duration_ms: self.started.elapsed().as_millis() as u64,
            errors,
            created_at: self.created_at,
            token_usage: self.usage,
            steps: self.steps,
        }
    }
}

/// Mean of step confidences; 0.0 for no steps.
pub fn mean_confidence(steps: &[ReasoningStep]) -> f64 {
    if steps.is_empty() {
        return 0.0;
    }
    steps.iter().map(|s| s.confidence).sum::<f64>() / steps.len() as f64
}

/// Distinct `tool_used` values in order of first use.
pub fn distinct_tools(steps: &[ReasoningStep]) -> Vec<ToolKind> {
    let mut tools = Vec::new();
    for tool in steps.iter().filter_map(|s| s.tool_used) {
        if !tools.contains(&tool) {
            tools.push(tool);
        }
    }
    tools
}

/// Human-readable explanation, one line per step.
pub fn explain(steps: &[ReasoningStep]) -> String {
    steps
        .iter()
        .map(|s| format!("{}. {}: {}", s.step_number, s.description, s.reasoning))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn step(description: &str, tool: Option<ToolKind>, confidence: f64) -> ReasoningStep {
        let step = ReasoningStep::new(description)
            .with_reasoning(format!("did {}", description))
            .with_confidence(confidence);
        match tool {
            Some(t) => step.with_tool(t),
            None => step,
        }
    }

    #[test]
    fn test_record_assigns_sequential_numbers() {
        let mut recorder = TraceRecorder::new("p");
        assert_eq!(recorder.record(step("a", None, 0.9)), 1);
        assert_eq!(recorder.record(step("b", None, 0.9).with_duration_ms(5)), 2);
        assert_eq!(recorder.len(), 2);

        let trace = recorder.finish("answer", 0.5);
        let numbers: Vec<usize> = trace.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_finish_aggregates() {
        let mut recorder = TraceRecorder::new("What is 2+2?");
        recorder.record(step("Analyze", None, 0.9));
        recorder.record(step("Plan", None, 0.85));
        recorder.record(step("Math", Some(ToolKind::Math), 0.9));
        recorder.record(step("Synthesize", None, 0.85));

        let trace = recorder.finish("4", 0.7);
        assert!(trace.success);
        assert!((trace.confidence - 0.875).abs() < 1e-9);
        assert_eq!(trace.tools_used, vec![ToolKind::Math]);
        assert_eq!(trace.final_answer, "4");
        assert!(trace.errors.is_none());
        assert_eq!(
            trace.reasoning.lines().next(),
            Some("1. Analyze: did Analyze")
        );
        assert_eq!(trace.reasoning.lines().count(), 4);
    }

    #[test]
    fn test_success_ignores_tool_failures() {
        let mut recorder = TraceRecorder::new("p");
        recorder.record(step("Web", Some(ToolKind::Web), 0.2).with_error("boom"));
        recorder.record(step("Synthesize", None, 0.85));

        let trace = recorder.finish("answer", 0.7);
        assert!(trace.success);
        assert!(trace.has_step_errors());
        assert!(trace.errors.is_none());
    }

    #[test]
    fn test_success_requires_strictly_greater() {
        let mut recorder = TraceRecorder::new("p");
        recorder.record(step("Synthesize", None, 0.7));
        assert!(!recorder.finish("answer", 0.7).success);
    }

    #[test]
    fn test_fail_keeps_steps_and_error() {
        let mut recorder = TraceRecorder::new("p");
        recorder.record(step("Analyze", None, 0.9));
        let trace = recorder.fail("cancelled");

        assert!(!trace.success);
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.errors, Some(vec!["cancelled".to_string()]));
        assert!(trace.final_answer.is_empty());
    }

    #[test]
    fn test_empty_trace() {
        let trace = TraceRecorder::new("").fail("invalid");
        assert_eq!(trace.confidence, 0.0);
        assert!(trace.tools_used.is_empty());
        assert!(trace.reasoning.is_empty());
    }

    #[test]
    fn test_distinct_tools_first_seen_order() {
        let steps = vec![
            step("m", Some(ToolKind::Memory), 0.5),
            step("w", Some(ToolKind::Web), 0.5),
            step("m2", Some(ToolKind::Memory), 0.5),
            step("s", None, 0.5),
        ];
        assert_eq!(distinct_tools(&steps), vec![ToolKind::Memory, ToolKind::Web]);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut recorder = TraceRecorder::new("p");
        recorder.add_usage(&TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        });
        recorder.add_usage(&TokenUsage {
            input_tokens: 1,
            output_tokens: 1,
        });
        assert_eq!(recorder.fail("x").token_usage.total(), 17);
    }
}
