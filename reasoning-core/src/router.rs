//! Heuristic tool routing.
//!
//! The router decides which auxiliary tools a problem needs by matching the
//! problem text and the planner's output against a keyword rule table. It is
//! a pure function of its inputs: no I/O, no model calls.
//!
//! Rules are data. Tests and embedders can add or drop rules without touching
//! the engine's control flow:
//!
//! ```rust,ignore
//! use reasoning_core::{ToolKind, ToolRouter, ToolRule};
//!
//! let router = ToolRouter::default()
//!     .without(ToolKind::Memory)
//!     .with_rule(ToolRule::new(ToolKind::Web).with_keywords(["stock", "forecast"]))?;
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tools::ToolKind;

/// Keyword rule selecting one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRule {
    pub tool: ToolKind,
    /// Case-insensitive substrings that select the tool
    pub keywords: Vec<String>,
    /// Also select the tool when the problem or plan contains any ASCII digit
    #[serde(default)]
    pub match_digits: bool,
    /// Restrict digit matching to the problem text, ignoring the plan
    #[serde(default)]
    pub digits_in_problem_only: bool,
}

impl ToolRule {
    pub fn new(tool: ToolKind) -> Self {
        Self {
            tool,
            keywords: Vec::new(),
            match_digits: false,
            digits_in_problem_only: false,
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn matching_digits(mut self) -> Self {
        self.match_digits = true;
        self
    }

    /// Match digits in the problem only. Useful when plans are numbered lists.
    pub fn digits_in_problem_only(mut self) -> Self {
        self.digits_in_problem_only = true;
        self
    }

    /// The built-in rule table.
    pub fn defaults() -> Vec<ToolRule> {
        vec![
            ToolRule::new(ToolKind::Web).with_keywords([
                "current",
                "recent",
                "latest",
                "news",
                "today",
                "who is",
                "what is happening",
                "price",
                "weather",
                "search",
                "look up",
                "2024",
                "2025",
            ]),
            ToolRule::new(ToolKind::Memory).with_keywords([
                "remember",
                "recall",
                "previous",
                "earlier",
                "last time",
                "we discussed",
                "my preference",
                "you told me",
            ]),
            ToolRule::new(ToolKind::Math)
                .with_keywords([
                    "calculate",
                    "compute",
                    "solve",
                    "equation",
                    "sum",
                    "product",
                    "percentage",
                    "derivative",
                    "integral",
                ])
                .matching_digits(),
        ]
    }

    fn compile(&self) -> Result<Option<Regex>> {
        if self.keywords.is_empty() {
            return Ok(None);
        }
        let alternation = self
            .keywords
            .iter()
            .map(|k| regex::escape(&k.to_lowercase()))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!("(?i)(?:{})", alternation))
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid routing rule for {}: {}", self.tool, e)))
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: ToolRule,
    pattern: Option<Regex>,
}

impl CompiledRule {
    fn matches(&self, problem: &str, combined: &str) -> bool {
        if self.rule.match_digits {
            let haystack = if self.rule.digits_in_problem_only {
                problem
            } else {
                combined
            };
            if haystack.chars().any(|c| c.is_ascii_digit()) {
                return true;
            }
        }
        self.pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(combined))
    }
}

/// Rule-table router for the web, memory and math tools.
#[derive(Debug, Clone)]
pub struct ToolRouter {
    rules: Vec<CompiledRule>,
}

impl Default for ToolRouter {
    fn default() -> Self {
        // The built-in keywords are escaped literals and always compile.
        Self::new(ToolRule::defaults()).expect("default routing rules are valid")
    }
}

impl ToolRouter {
    /// Build a router from a rule table.
    pub fn new(rules: Vec<ToolRule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let pattern = rule.compile()?;
                Ok(CompiledRule { rule, pattern })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Router with no rules; selects nothing.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule. Several rules for one tool are OR-ed together.
    pub fn with_rule(mut self, rule: ToolRule) -> Result<Self> {
        let pattern = rule.compile()?;
        self.rules.push(CompiledRule { rule, pattern });
        Ok(self)
    }

    /// Drop every rule for `tool`.
    pub fn without(mut self, tool: ToolKind) -> Self {
        self.rules.retain(|r| r.rule.tool != tool);
        self
    }

    /// The active rule table.
    pub fn rules(&self) -> impl Iterator<Item = &ToolRule> {
        self.rules.iter().map(|r| &r.rule)
    }

    /// Whether any rule for `tool` matches the problem and plan.
    pub fn needs(&self, tool: ToolKind, problem: &str, plan: &str) -> bool {
        let combined = format!("{} {}", problem, plan).to_lowercase();
        self.rules
            .iter()
            .filter(|r| r.rule.tool == tool)
            .any(|r| r.matches(problem, &combined))
    }

    pub fn needs_web(&self, problem: &str, plan: &str) -> bool {
        self.needs(ToolKind::Web, problem, plan)
    }

    pub fn needs_memory(&self, problem: &str, plan: &str) -> bool {
        self.needs(ToolKind::Memory, problem, plan)
    }

    pub fn needs_math(&self, problem: &str, plan: &str) -> bool {
        self.needs(ToolKind::Math, problem, plan)
    }

    /// Tools to invoke, in fixed web → memory → math order.
    ///
    /// Each decision is independent; a tool is selected only if it is also
    /// in `enabled`.
    pub fn select(&self, problem: &str, plan: &str, enabled: &[ToolKind]) -> Vec<ToolKind> {
        ToolKind::INVOCATION_ORDER
            .into_iter()
            .filter(|tool| enabled.contains(tool))
            .filter(|tool| self.needs(*tool, problem, plan))
            .collect()
    }
}
