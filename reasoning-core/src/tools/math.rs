//! Math evaluation adapter contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Expression to evaluate, with optional surrounding text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathRequest {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl MathRequest {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Outcome of a math evaluation.
///
/// `success == false` means the evaluator produced a result it is not sure
/// of; a hard failure is an `Err` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathResult {
    pub success: bool,
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl MathResult {
    pub fn exact(result: impl Into<Value>) -> Self {
        Self {
            success: true,
            result: result.into(),
            explanation: None,
        }
    }

    pub fn uncertain(result: impl Into<Value>) -> Self {
        Self {
            success: false,
            result: result.into(),
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }
}

/// Evaluate mathematical expressions.
///
/// Failures are reported as [`crate::Error::MathTool`].
#[async_trait]
pub trait MathTool: Send + Sync {
    async fn compute(&self, request: MathRequest) -> Result<MathResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_math_result_constructors() {
        let exact = MathResult::exact(4);
        assert!(exact.success);
        assert_eq!(exact.result, json!(4));

        let uncertain = MathResult::uncertain("about 3.14").with_explanation("series truncated");
        assert!(!uncertain.success);
        assert_eq!(uncertain.explanation.as_deref(), Some("series truncated"));
    }

    #[test]
    fn test_math_request_omits_empty_context() {
        let json = serde_json::to_value(MathRequest::new("2+2")).unwrap();
        assert_eq!(json, json!({"expression": "2+2"}));
    }
}
