//! The staged reasoning pipeline.
//!
//! A run moves through a fixed sequence of stages:
//!
//! 1. ANALYZE: one gateway call classifying the problem
//! 2. PLAN: one gateway call producing an action plan
//! 3. EXECUTE TOOLS: routed web / memory / math calls, run concurrently
//! 4. SYNTHESIZE: one gateway call combining every prior step
//! 5. FINALIZE: aggregate confidence, derive success, attach suggestions
//!
//! Stage and tool failures are confined to their own step; only validation
//! errors and cancellation end a run early.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::llm::{ChatMessage, ChatOptions, FallbackGateway, LanguageModelGateway};
use crate::router::ToolRouter;
use crate::tools::{MathRequest, MathTool, MemoryQuery, MemoryTool, ToolKind, WebTool};

use super::prompts;
use super::suggestions::suggest;
use super::trace::TraceRecorder;
use super::types::{
    MemoryOutput, ReasoningQuery, ReasoningResponse, ReasoningStep, StepOutput, WebOutput,
};
use super::MIN_STEPS;

/// Description of the final step of every completed run.
pub const SYNTHESIS_DESCRIPTION: &str = "Synthesize final answer";

/// Answer used when the synthesis stage could not reach any provider.
pub const FALLBACK_ANSWER: &str = "I was unable to generate a complete answer to this problem.";

/// Web and memory results requested per call unless overridden.
pub const DEFAULT_MAX_RESULTS: usize = 5;

const ANALYSIS_CONFIDENCE: f64 = 0.9;
const PLAN_CONFIDENCE: f64 = 0.85;
const SYNTHESIS_CONFIDENCE: f64 = 0.85;
const STAGE_FAILURE_CONFIDENCE: f64 = 0.1;

const WEB_CONFIDENCE: f64 = 0.8;
const MEMORY_CONFIDENCE: f64 = 0.75;
const MATH_EXACT_CONFIDENCE: f64 = 0.9;
const MATH_UNCERTAIN_CONFIDENCE: f64 = 0.3;
const TOOL_FAILURE_CONFIDENCE: f64 = 0.2;

const WEB_DESCRIPTION: &str = "Search the web for current information";
const MEMORY_DESCRIPTION: &str = "Recall relevant memories";
const MATH_DESCRIPTION: &str = "Compute mathematical result";

/// LLM-driven stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Analyze,
    Plan,
    Synthesize,
}

impl Stage {
    fn description(self) -> &'static str {
        match self {
            Self::Analyze => "Analyze the problem",
            Self::Plan => "Plan the solution strategy",
            Self::Synthesize => SYNTHESIS_DESCRIPTION,
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            Self::Analyze => prompts::ANALYZER_SYSTEM_PROMPT,
            Self::Plan => prompts::PLANNER_SYSTEM_PROMPT,
            Self::Synthesize => prompts::SYNTHESIZER_SYSTEM_PROMPT,
        }
    }

    fn confidence(self) -> f64 {
        match self {
            Self::Analyze => ANALYSIS_CONFIDENCE,
            Self::Plan => PLAN_CONFIDENCE,
            Self::Synthesize => SYNTHESIS_CONFIDENCE,
        }
    }

    fn success_note(self) -> &'static str {
        match self {
            Self::Analyze => "Identified the problem type and the information needed",
            Self::Plan => "Outlined the steps and information sources for the answer",
            Self::Synthesize => "Combined the analysis, plan and tool evidence into an answer",
        }
    }
}

/// Multi-step reasoning engine.
///
/// Holds only shared handles and read-only configuration, so one engine can
/// serve many concurrent runs.
#[derive(Clone)]
pub struct ReasoningEngine {
    gateway: Arc<dyn LanguageModelGateway>,
    web: Option<Arc<dyn WebTool>>,
    memory: Option<Arc<dyn MemoryTool>>,
    math: Option<Arc<dyn MathTool>>,
    router: ToolRouter,
    config: ModelConfig,
    max_results: usize,
}

impl ReasoningEngine {
    /// Create an engine with no tool adapters and the default router.
    pub fn new(gateway: Arc<dyn LanguageModelGateway>, config: ModelConfig) -> Self {
        Self {
            gateway,
            web: None,
            memory: None,
            math: None,
            router: ToolRouter::default(),
            config,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Create an engine backed by a [`FallbackGateway`] over the configured providers.
    pub fn from_config(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let gateway = FallbackGateway::from_config(&config)?;
        Ok(Self::new(Arc::new(gateway), config))
    }

    pub fn with_web_tool(mut self, tool: Arc<dyn WebTool>) -> Self {
        self.web = Some(tool);
        self
    }

    pub fn with_memory_tool(mut self, tool: Arc<dyn MemoryTool>) -> Self {
        self.memory = Some(tool);
        self
    }

    pub fn with_math_tool(mut self, tool: Arc<dyn MathTool>) -> Self {
        self.math = Some(tool);
        self
    }

    pub fn with_router(mut self, router: ToolRouter) -> Self {
        self.router = router;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn router(&self) -> &ToolRouter {
        &self.router
    }

    /// A query carrying this engine's configured step budget and threshold.
    pub fn query(&self, problem: impl Into<String>) -> ReasoningQuery {
        ReasoningQuery::new(problem)
            .with_max_steps(self.config.max_steps)
            .with_confidence_threshold(self.config.confidence_threshold)
    }

    /// Run the pipeline to completion.
    pub async fn reason(&self, query: ReasoningQuery) -> ReasoningResponse {
        self.reason_with_cancel(query, CancellationToken::new()).await
    }

    /// Run the pipeline, abandoning in-flight calls once `cancel` fires.
    ///
    /// A cancelled run returns the steps recorded so far with
    /// `success == false`.
    #[instrument(skip_all, fields(max_steps = query.max_steps))]
    pub async fn reason_with_cancel(
        &self,
        query: ReasoningQuery,
        cancel: CancellationToken,
    ) -> ReasoningResponse {
        if let Err(e) = query.validate() {
            warn!(error = %e, "rejected reasoning query");
            let trace = TraceRecorder::new(query.problem.clone()).fail(e.to_string());
            return ReasoningResponse::failed(trace, &e);
        }

        let mut recorder = TraceRecorder::new(query.problem.clone());
        let problem_id = recorder.problem_id();

        match self.run(&query, &mut recorder, &cancel).await {
            Ok(final_answer) => {
                let trace = recorder.finish(final_answer, query.confidence_threshold);
                info!(
                    %problem_id,
                    success = trace.success,
                    confidence = trace.confidence,
                    steps = trace.steps.len(),
                    duration_ms = trace.duration_ms,
                    "reasoning run finished"
                );
                let suggestions = suggest(&query, &trace);
                ReasoningResponse::completed(trace, suggestions)
            }
            Err(e) => {
                warn!(%problem_id, error = %e, steps = recorder.len(), "reasoning run aborted");
                let trace = recorder.fail(e.to_string());
                ReasoningResponse::failed(trace, &e)
            }
        }
    }

    /// Drive the stages; returns the final answer. Only cancellation is an `Err`.
    async fn run(
        &self,
        query: &ReasoningQuery,
        recorder: &mut TraceRecorder,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let analysis = self
            .llm_stage(Stage::Analyze, prompts::analysis_prompt(query), recorder, cancel)
            .await?
            .unwrap_or_default();

        let plan = self
            .llm_stage(
                Stage::Plan,
                prompts::planning_prompt(query, &analysis),
                recorder,
                cancel,
            )
            .await?
            .unwrap_or_default();

        self.execute_tools(query, &plan, recorder, cancel).await?;

        let prompt = prompts::synthesis_prompt(query, recorder.steps());
        let answer = self
            .llm_stage(Stage::Synthesize, prompt, recorder, cancel)
            .await?;

        Ok(answer.unwrap_or_else(|| FALLBACK_ANSWER.to_string()))
    }

    /// One gateway call for `stage`, recorded as a step.
    ///
    /// Returns `None` when every provider failed; the step then carries the
    /// failure at low confidence and the pipeline continues.
    async fn llm_stage(
        &self,
        stage: Stage,
        prompt: String,
        recorder: &mut TraceRecorder,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let started = Instant::now();
        let messages = vec![
            ChatMessage::system(stage.system_prompt()),
            ChatMessage::user(prompt),
        ];

        let outcome = cancellable(cancel, self.gateway.chat(messages, ChatOptions::new())).await;
        let step = ReasoningStep::new(stage.description());

        let (step, text) = match outcome {
            Ok(outcome) => {
                recorder.add_usage(&outcome.usage);
                let text = outcome.message.content;
                let step = step
                    .with_output(StepOutput::analysis(text.clone()))
                    .with_reasoning(stage.success_note())
                    .with_confidence(stage.confidence())
                    .with_provenance(outcome.provider_used, outcome.model_used);
                (step, Some(text))
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(stage = stage.description(), error = %e, "reasoning stage failed");
                let step = step
                    .with_reasoning(format!(
                        "{} failed; continuing with degraded information",
                        stage.description()
                    ))
                    .with_confidence(STAGE_FAILURE_CONFIDENCE)
                    .with_error(e.to_string());
                (step, None)
            }
        };

        let number = recorder.record(step.with_duration_ms(elapsed_ms(started)));
        debug!(stage = stage.description(), step = number, ok = text.is_some(), "stage complete");
        Ok(text)
    }

    /// Route, invoke and record the auxiliary tools.
    ///
    /// Calls run concurrently; steps are recorded in web, memory, math order.
    async fn execute_tools(
        &self,
        query: &ReasoningQuery,
        plan: &str,
        recorder: &mut TraceRecorder,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut tools = self
            .router
            .select(&query.problem, plan, &query.enabled_tools);
        let budget = query.max_steps.saturating_sub(MIN_STEPS);
        if tools.len() > budget {
            debug!(selected = ?tools, budget, "dropping tools over the step budget");
            tools.truncate(budget);
        }
        if tools.is_empty() {
            return Ok(());
        }
        debug!(tools = ?tools, "invoking tools");

        let web = async {
            if tools.contains(&ToolKind::Web) {
                Some(self.web_step(query, cancel).await)
            } else {
                None
            }
        };
        let memory = async {
            if tools.contains(&ToolKind::Memory) {
                Some(self.memory_step(query, cancel).await)
            } else {
                None
            }
        };
        let math = async {
            if tools.contains(&ToolKind::Math) {
                Some(self.math_step(query, plan, cancel).await)
            } else {
                None
            }
        };
        let (web, memory, math) = futures::join!(web, memory, math);

        let mut interrupted = None;
        for outcome in [web, memory, math].into_iter().flatten() {
            match outcome {
                Ok(step) => {
                    recorder.record(step);
                }
                Err(e) => interrupted = Some(e),
            }
        }
        match interrupted {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn web_step(
        &self,
        query: &ReasoningQuery,
        cancel: &CancellationToken,
    ) -> Result<ReasoningStep> {
        let started = Instant::now();
        let step = ReasoningStep::new(WEB_DESCRIPTION)
            .with_tool(ToolKind::Web)
            .with_input(json!({ "query": query.problem, "max_results": self.max_results }));

        let outcome = match &self.web {
            Some(web) => {
                let call = web.search_and_analyze(&query.problem, self.max_results);
                cancellable(cancel, self.deadline(call)).await
            }
            None => Err(Error::WebTool("no web search adapter configured".to_string())),
        };

        let step = match outcome {
            Ok(results) => {
                let note = format!("Found {} relevant web results", results.len());
                step.with_output(StepOutput::Web(WebOutput { results }))
                    .with_reasoning(note)
                    .with_confidence(WEB_CONFIDENCE)
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => tool_failure(step, ToolKind::Web, e),
        };
        Ok(step.with_duration_ms(elapsed_ms(started)))
    }

    async fn memory_step(
        &self,
        query: &ReasoningQuery,
        cancel: &CancellationToken,
    ) -> Result<ReasoningStep> {
        let started = Instant::now();
        let request = MemoryQuery::new(query.problem.clone(), self.max_results);
        let step = ReasoningStep::new(MEMORY_DESCRIPTION)
            .with_tool(ToolKind::Memory)
            .with_input(json!({ "query": request.query, "max_results": request.max_results }));

        let outcome = match &self.memory {
            Some(memory) => cancellable(cancel, self.deadline(memory.search_memories(request))).await,
            None => Err(Error::MemoryTool("no memory adapter configured".to_string())),
        };

        let step = match outcome {
            Ok(memories) => {
                let note = format!("Recalled {} relevant memories", memories.len());
                step.with_output(StepOutput::Memory(MemoryOutput { memories }))
                    .with_reasoning(note)
                    .with_confidence(MEMORY_CONFIDENCE)
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => tool_failure(step, ToolKind::Memory, e),
        };
        Ok(step.with_duration_ms(elapsed_ms(started)))
    }

    async fn math_step(
        &self,
        query: &ReasoningQuery,
        plan: &str,
        cancel: &CancellationToken,
    ) -> Result<ReasoningStep> {
        let started = Instant::now();
        let mut request = MathRequest::new(query.problem.clone());
        if !plan.trim().is_empty() {
            request = request.with_context(plan.trim());
        }
        let step = ReasoningStep::new(MATH_DESCRIPTION)
            .with_tool(ToolKind::Math)
            .with_input(json!({ "expression": request.expression, "context": request.context }));

        let outcome = match &self.math {
            Some(math) => cancellable(cancel, self.deadline(math.compute(request))).await,
            None => Err(Error::MathTool("no math adapter configured".to_string())),
        };

        let step = match outcome {
            Ok(result) => {
                let (confidence, note) = if result.success {
                    (MATH_EXACT_CONFIDENCE, format!("Computed result: {}", result.result))
                } else {
                    (
                        MATH_UNCERTAIN_CONFIDENCE,
                        format!("Computed an uncertain result: {}", result.result),
                    )
                };
                step.with_output(StepOutput::Math(result.into()))
                    .with_reasoning(note)
                    .with_confidence(confidence)
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => tool_failure(step, ToolKind::Math, e),
        };
        Ok(step.with_duration_ms(elapsed_ms(started)))
    }

    /// Bound a tool call by the configured timeout.
    async fn deadline<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = Duration::from_millis(self.config.timeout_ms);
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(Error::timeout(self.config.timeout_ms)))
    }
}

/// Race `call` against the run's cancellation token.
async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        outcome = call => outcome,
    }
}

fn tool_failure(step: ReasoningStep, tool: ToolKind, error: Error) -> ReasoningStep {
    warn!(%tool, error = %error, "tool call failed");
    step.with_reasoning(format!("The {} tool failed; continuing without it", tool))
        .with_confidence(TOOL_FAILURE_CONFIDENCE)
        .with_error(error.to_string())
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
