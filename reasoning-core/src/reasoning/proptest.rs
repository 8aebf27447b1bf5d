//! Property-based tests for trace aggregation using proptest.
//!
//! These tests check the invariants every finished trace must satisfy:
//!
//! - Step numbers are contiguous and 1-based
//! - Trace confidence is the mean of step confidences and stays in [0, 1]
//! - Success depends only on the last step's confidence
//! - `tools_used` lists each tool once, in order of first use

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::reasoning::{ReasoningStep, TraceRecorder};
    use crate::tools::ToolKind;

    fn tool() -> impl Strategy<Value = Option<ToolKind>> {
        prop_oneof![
            Just(None),
            Just(Some(ToolKind::Web)),
            Just(Some(ToolKind::Memory)),
            Just(Some(ToolKind::Math)),
        ]
    }

    fn step() -> impl Strategy<Value = ReasoningStep> {
        (tool(), 0.0f64..=1.0, any::<bool>()).prop_map(|(tool, confidence, failed)| {
            let mut step = ReasoningStep::new("step").with_confidence(confidence);
            if let Some(tool) = tool {
                step = step.with_tool(tool);
            }
            if failed {
                step = step.with_error("failed");
            }
            step
        })
    }

    fn steps() -> impl Strategy<Value = Vec<ReasoningStep>> {
        prop::collection::vec(step(), 1..12)
    }

    fn record_all(steps: Vec<ReasoningStep>) -> TraceRecorder {
        let mut recorder = TraceRecorder::new("problem");
        for step in steps {
            recorder.record(step);
        }
        recorder
    }

    proptest! {
        /// Step numbers are 1..=n in order.
        #[test]
        fn step_numbers_are_contiguous(steps in steps()) {
            let n = steps.len();
            let trace = record_all(steps).finish("answer", 0.7);
            let numbers: Vec<usize> = trace.steps.iter().map(|s| s.step_number).collect();
            prop_assert_eq!(numbers, (1..=n).collect::<Vec<_>>());
        }

        /// Trace confidence is the bounded mean of step confidences.
        #[test]
        fn confidence_is_mean_of_steps(steps in steps()) {
            let expected =
                steps.iter().map(|s| s.confidence).sum::<f64>() / steps.len() as f64;
            let trace = record_all(steps).finish("answer", 0.7);
            prop_assert!((trace.confidence - expected).abs() < 1e-9);
            prop_assert!((0.0..=1.0).contains(&trace.confidence));
        }

        /// Success is decided by the last step alone, strictly above the threshold.
        #[test]
        fn success_depends_only_on_last_step(
            steps in steps(),
            threshold in 0.0f64..=1.0
        ) {
            let last = steps[steps.len() - 1].confidence;
            let trace = record_all(steps).finish("answer", threshold);
            prop_assert_eq!(trace.success, last > threshold);
            prop_assert!(trace.errors.is_none());
        }

        /// Each tool appears once in `tools_used`, in first-use order.
        #[test]
        fn tools_used_is_distinct_first_seen(steps in steps()) {
            let mut expected = Vec::new();
            for tool in steps.iter().filter_map(|s| s.tool_used) {
                if !expected.contains(&tool) {
                    expected.push(tool);
                }
            }
            let trace = record_all(steps).finish("answer", 0.7);
            prop_assert_eq!(trace.tools_used, expected);
        }

        /// A failed run never reports success and keeps what was recorded.
        #[test]
        fn failed_runs_keep_partial_steps(steps in steps()) {
            let n = steps.len();
            let trace = record_all(steps).fail("cancelled");
            prop_assert!(!trace.success);
            prop_assert_eq!(trace.steps.len(), n);
            prop_assert_eq!(trace.reasoning.lines().count(), n);
        }
    }
}
