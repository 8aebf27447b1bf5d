//! Post-hoc advisory suggestions for a finished trace.
//!
//! Suggestions are hints for the caller. They never change `success`.

use regex::Regex;
use std::sync::LazyLock;

use crate::tools::ToolKind;

use super::engine::FALLBACK_ANSWER;
use super::types::{ReasoningQuery, ReasoningTrace};

/// Trace confidence below this earns a suggestion.
pub const LOW_CONFIDENCE: f64 = 0.7;

static RECENCY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(current|currently|recent|recently|latest|today|news|now)\b")
        .expect("invalid regex")
});

/// Produce advisory notes for a completed run.
pub fn suggest(query: &ReasoningQuery, trace: &ReasoningTrace) -> Vec<String> {
    let mut suggestions = Vec::new();

    if trace.confidence < LOW_CONFIDENCE {
        suggestions.push(format!(
            "Overall confidence is low ({:.0}%); consider adding context or enabling more tools.",
            trace.confidence * 100.0
        ));
    }

    let failed: Vec<String> = trace
        .steps
        .iter()
        .filter(|s| s.has_errors())
        .map(|s| format!("{} ({})", s.step_number, s.description))
        .collect();
    if !failed.is_empty() {
        suggestions.push(format!(
            "Some steps reported errors: {}. Check tool and provider availability.",
            failed.join(", ")
        ));
    }

    if RECENCY_PATTERN.is_match(&query.problem) && !trace.tools_used.contains(&ToolKind::Web) {
        suggestions.push(
            "This question may depend on recent information; consider enabling web search."
                .to_string(),
        );
    }

    if trace.final_answer == FALLBACK_ANSWER {
        suggestions.push(
            "No language model provider produced an answer; verify provider configuration."
                .to_string(),
        );
    }

    suggestions
}
