//! Prompt construction for the LLM-driven stages.

use super::types::{ReasoningQuery, ReasoningStep};

pub const ANALYZER_SYSTEM_PROMPT: &str = "You are an expert problem analyst. \
Classify the user's problem, restate what is being asked, and list the information \
needed to answer it: facts that may require a current web search, details the user \
may have shared in earlier conversations, and any calculations involved. \
Be concise and structured.";

pub const PLANNER_SYSTEM_PROMPT: &str = "You are a strategic planner. \
Given a problem and its analysis, produce a short ordered action plan for answering it. \
Name the information sources each action relies on (web search, memory recall, \
mathematical computation, or reasoning alone). Do not answer the problem yet.";

pub const SYNTHESIZER_SYSTEM_PROMPT: &str = "You are a careful reasoner. \
Combine the analysis, plan and gathered evidence below into one coherent, direct answer \
to the original problem. Prefer evidence from tools over assumptions, mention remaining \
uncertainty briefly, and do not describe the intermediate steps.";

/// User prompt for the query analyzer.
pub fn analysis_prompt(query: &ReasoningQuery) -> String {
    let mut prompt = format!("Problem:\n{}\n", query.problem.trim());
    if let Some(query_type) = &query.query_type {
        prompt.push_str(&format!("\nProblem type hint: {}\n", query_type));
    }
    if let Some(context) = &query.context {
        prompt.push_str(&format!("\nAdditional context:\n{}\n", context.trim()));
    }
    prompt.push_str("\nAnalyze this problem and identify the information needed to solve it.");
    prompt
}

/// User prompt for the strategy planner, built from the analyzer's output.
pub fn planning_prompt(query: &ReasoningQuery, analysis: &str) -> String {
    let analysis = if analysis.trim().is_empty() {
        "(analysis unavailable)"
    } else {
        analysis.trim()
    };
    format!(
        "Problem:\n{}\n\nAnalysis:\n{}\n\nCreate a step-by-step plan to solve this problem.",
        query.problem.trim(),
        analysis
    )
}

/// User prompt for the answer synthesizer, embedding every prior step.
pub fn synthesis_prompt(query: &ReasoningQuery, steps: &[ReasoningStep]) -> String {
    let mut prompt = format!("Original problem:\n{}\n", query.problem.trim());
    if let Some(context) = &query.context {
        prompt.push_str(&format!("\nContext:\n{}\n", context.trim()));
    }

    prompt.push_str("\nReasoning so far:\n");
    for step in steps {
        prompt.push_str(&format!("\n## Step {}: {}\n", step.step_number, step.description));
        if let Some(tool) = step.tool_used {
            prompt.push_str(&format!("Tool: {}\n", tool));
        }
        if let Some(output) = &step.tool_output {
            prompt.push_str(&format!("Output:\n{}\n", output.render()));
        }
        if !step.reasoning.is_empty() {
            prompt.push_str(&format!("Reasoning: {}\n", step.reasoning));
        }
        if let Some(errors) = &step.errors {
            prompt.push_str(&format!("Errors: {}\n", errors.join("; ")));
        }
    }

    prompt.push_str("\nUsing all of the above, give the final answer to the original problem.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::StepOutput;
    use crate::tools::ToolKind;

    #[test]
    fn test_analysis_prompt_includes_hints() {
        let query = ReasoningQuery::new("What is 2+2?")
            .with_type("math")
            .with_context("homework");
        let prompt = analysis_prompt(&query);

        assert!(prompt.contains("What is 2+2?"));
        assert!(prompt.contains("Problem type hint: math"));
        assert!(prompt.contains("homework"));
    }

    #[test]
    fn test_planning_prompt_without_analysis() {
        let query = ReasoningQuery::new("Explain tides");
        let prompt = planning_prompt(&query, "  ");
        assert!(prompt.contains("(analysis unavailable)"));
    }

    #[test]
    fn test_synthesis_prompt_embeds_steps() {
        let query = ReasoningQuery::new("What is 2+2?");
        let mut math = ReasoningStep::new("Compute the expression")
            .with_tool(ToolKind::Math)
            .with_output(StepOutput::analysis("4"))
            .with_reasoning("exact result")
            .with_error("slow evaluator");
        math.step_number = 3;

        let prompt = synthesis_prompt(&query, &[math]);
        assert!(prompt.contains("## Step 3: Compute the expression"));
        assert!(prompt.contains("Tool: math"));
        assert!(prompt.contains("Output:\n4"));
        assert!(prompt.contains("Reasoning: exact result"));
        assert!(prompt.contains("Errors: slow evaluator"));
    }
}
