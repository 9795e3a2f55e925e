//! Agent implementation: the reasoning–action–observation loop

use crate::agent::config::{AgentBuilder, AgentConfig};
use crate::agent::execution::{ExecutionResult, TerminatedReason};
use crate::agent::prompt::PromptBuilder;
use crate::error::{ProviderError, Result};
use crate::llm::{CompletionOptions, ModelProvider};
use crate::memory::Memory;
use crate::parser::{self, Decision};
use crate::tools::{Observation, Tool, ToolInfo, ToolRegistry};
use crate::trace::{ExecutionTrace, Step, StepAction, TraceRecorder};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome of one model call after the retry policy ran its course
enum ModelOutcome {
    Completed(String),
    Cancelled,
    Failed(ProviderError),
}

/// An autonomous reasoning agent
///
/// Holds one model port, one tool registry, one configuration, and
/// optionally a memory port and a trace recorder. Stateless across
/// executions except through memory: every `execute()` call keeps its
/// history and trace in call-local state, so one agent instance can serve
/// many concurrent executions without cross-talk.
pub struct Agent {
    config: AgentConfig,
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    memory: Option<Arc<dyn Memory>>,
    recorder: Option<TraceRecorder>,
    prompts: PromptBuilder,
}

impl Agent {
    /// Create an agent with no tools, memory, or recorder
    pub async fn new(model: Arc<dyn ModelProvider>, config: AgentConfig) -> Result<Self> {
        Self::assemble(model, config, Vec::new(), None, None).await
    }

    /// Start building an agent
    pub fn builder(model: Arc<dyn ModelProvider>) -> AgentBuilder {
        AgentBuilder::new(model)
    }

    pub(crate) async fn assemble(
        model: Arc<dyn ModelProvider>,
        config: AgentConfig,
        tools: Vec<Arc<dyn Tool>>,
        memory: Option<Arc<dyn Memory>>,
        recorder: Option<TraceRecorder>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool).await?;
        }

        Ok(Self {
            config,
            model,
            tools: Arc::new(registry),
            memory,
            recorder,
            prompts: PromptBuilder::new()?,
        })
    }

    /// Get the agent configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Register a tool
    ///
    /// Fails with a configuration error on a duplicate name.
    pub async fn add_tool(&self, tool: Arc<dyn Tool>) -> Result<()> {
        self.tools.register(tool).await
    }

    /// List registered tools in registration order
    pub async fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools.list().await
    }

    /// Execute a task to completion
    ///
    /// Never fails for recoverable conditions: parse failures, tool faults,
    /// and budget exhaustion are all encoded in the returned
    /// [`ExecutionResult`] and its trace.
    pub async fn execute(
        &self,
        task: &str,
        context: Option<HashMap<String, String>>,
    ) -> ExecutionResult {
        self.run(task, context, CancellationToken::new()).await
    }

    /// Execute a task under a cancellation token
    ///
    /// Cancelling the token stops the in-flight model call or tool dispatch
    /// promptly; the result carries `TerminatedReason::Cancelled` and the
    /// partial trace up to that point.
    pub async fn execute_with_cancellation(
        &self,
        task: &str,
        context: Option<HashMap<String, String>>,
        token: CancellationToken,
    ) -> ExecutionResult {
        self.run(task, context, token).await
    }

    async fn run(
        &self,
        task: &str,
        context: Option<HashMap<String, String>>,
        token: CancellationToken,
    ) -> ExecutionResult {
        let started = Instant::now();
        let execution_id = uuid::Uuid::new_v4().to_string();
        let mut trace = ExecutionTrace::new(execution_id.clone(), task.to_string());

        tracing::debug!(execution_id = %execution_id, "execution started");

        let memory_key = context
            .as_ref()
            .and_then(|c| c.get("memory_key"))
            .cloned();
        let recalled = match &memory_key {
            Some(key) => self.recall(key).await,
            None => None,
        };

        let options = CompletionOptions {
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
            model_hint: None,
        };

        let mut content = String::new();
        let mut terminated = TerminatedReason::BudgetExhausted;
        let mut fatal: Option<String> = None;

        while trace.len() < self.config.max_iterations {
            let index = trace.len() + 1;
            let step_started = Instant::now();
            let timestamp = Utc::now();

            let tool_infos = self.tools.list().await;
            let prompt = match self.prompts.build(
                task,
                context.as_ref(),
                &tool_infos,
                recalled.as_deref(),
                &trace.steps,
            ) {
                Ok(prompt) => prompt,
                Err(e) => {
                    tracing::error!(error = %e, "prompt assembly failed");
                    terminated = TerminatedReason::FatalError;
                    fatal = Some(e.to_string());
                    break;
                }
            };

            let raw = match self.complete_with_retry(&prompt, &options, &token).await {
                ModelOutcome::Completed(raw) => raw,
                ModelOutcome::Cancelled => {
                    terminated = TerminatedReason::Cancelled;
                    break;
                }
                ModelOutcome::Failed(err) => {
                    tracing::error!(iteration = index, error = %err, "provider failed beyond retry budget");
                    terminated = TerminatedReason::FatalError;
                    fatal = Some(err.to_string());
                    break;
                }
            };

            match parser::parse_with_policy(&raw, self.config.tie_break) {
                Err(parse_err) => {
                    tracing::warn!(iteration = index, error = %parse_err, "unparsable model output");

                    let observation = Observation {
                        success: false,
                        content: format!("Could not interpret model output: {}", parse_err),
                        data: None,
                        duration_ms: None,
                        error: None,
                    };

                    trace.steps.push(Step {
                        index,
                        thought: raw.trim().to_string(),
                        action: StepAction::ParseFailure {
                            message: parse_err.to_string(),
                        },
                        observation: Some(observation),
                        timestamp,
                        duration_ms: step_started.elapsed().as_millis() as u64,
                    });
                }
                Ok(Decision::FinalAnswer {
                    content: answer,
                    thought,
                }) => {
                    trace.steps.push(Step {
                        index,
                        thought,
                        action: StepAction::FinalAnswer {
                            content: answer.clone(),
                        },
                        observation: None,
                        timestamp,
                        duration_ms: step_started.elapsed().as_millis() as u64,
                    });

                    content = answer;
                    terminated = TerminatedReason::Answered;
                    break;
                }
                Ok(Decision::ToolCall {
                    tool_name,
                    tool_input,
                    thought,
                }) => {
                    tracing::debug!(iteration = index, tool = %tool_name, "dispatching tool");

                    let observation = tokio::select! {
                        _ = token.cancelled() => {
                            terminated = TerminatedReason::Cancelled;
                            break;
                        }
                        observation = self.tools.dispatch(
                            &tool_name,
                            &tool_input,
                            self.config.tool_timeout,
                        ) => observation,
                    };

                    trace.steps.push(Step {
                        index,
                        thought,
                        action: StepAction::ToolCall {
                            tool_name,
                            tool_input,
                        },
                        observation: Some(observation),
                        timestamp,
                        duration_ms: step_started.elapsed().as_millis() as u64,
                    });
                }
            }
        }

        // Best-effort partial content when the budget ran out.
        if terminated == TerminatedReason::BudgetExhausted {
            if let Some(observation) = trace.last_observation() {
                content = observation.content.clone();
            }
        }

        trace.completed_at = Some(Utc::now());
        let iterations_used = trace.len();

        if terminated == TerminatedReason::Answered {
            self.finalize_memory(&execution_id, memory_key.as_deref(), &content)
                .await;
        }

        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.record(&trace).await {
                tracing::warn!(error = %e, "failed to persist execution trace");
            }
        }

        tracing::debug!(
            execution_id = %execution_id,
            iterations = iterations_used,
            terminated = ?terminated,
            "execution finished"
        );

        ExecutionResult {
            content,
            trace,
            iterations_used,
            terminated,
            duration_ms: started.elapsed().as_millis() as u64,
            error: fatal,
        }
    }

    /// One model call under the bounded retry policy
    async fn complete_with_retry(
        &self,
        prompt: &str,
        options: &CompletionOptions,
        token: &CancellationToken,
    ) -> ModelOutcome {
        let mut attempt = 0u32;
        let mut backoff = self.config.retry.initial_backoff;

        loop {
            attempt += 1;

            let result = tokio::select! {
                _ = token.cancelled() => return ModelOutcome::Cancelled,
                result = self.model.complete(prompt, options) => result,
            };

            match result {
                Ok(raw) => return ModelOutcome::Completed(raw),
                Err(err) if err.is_retryable() && attempt < self.config.retry.max_attempts => {
                    tracing::warn!(attempt, error = %err, "retryable provider error, backing off");

                    tokio::select! {
                        _ = token.cancelled() => return ModelOutcome::Cancelled,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => return ModelOutcome::Failed(err),
            }
        }
    }

    async fn recall(&self, key: &str) -> Option<String> {
        let memory = self.memory.as_ref()?;

        match memory.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "memory recall failed, continuing without prior context");
                None
            }
        }
    }

    async fn finalize_memory(&self, execution_id: &str, memory_key: Option<&str>, content: &str) {
        let Some(memory) = &self.memory else {
            return;
        };

        let mut keys = vec![format!("task:{}", execution_id)];
        if let Some(key) = memory_key {
            keys.push(key.to_string());
        }

        for key in keys {
            if let Err(e) = memory.set(&key, content.to_string(), None).await {
                tracing::warn!(key = %key, error = %e, "memory write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, Error, ToolError};
    use crate::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Model provider driven by a fixed script of responses
    struct ScriptedProvider {
        responses: Mutex<VecDeque<std::result::Result<String, ProviderError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<std::result::Result<String, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn complete(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> std::result::Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(ProviderError::MalformedResponse {
                        message: "script exhausted".to_string(),
                    })
                })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    /// Provider that never returns in test-relevant time
    struct StallingProvider;

    #[async_trait]
    impl ModelProvider for StallingProvider {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> std::result::Result<String, ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(r#"{"final_answer": "too late"}"#.to_string())
        }

        fn model_name(&self) -> &str {
            "stalling"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input back"
        }

        async fn invoke(&self, input: &str) -> std::result::Result<Observation, ToolError> {
            Ok(Observation::success(format!("echo: {}", input)))
        }
    }

    fn fast_retry() -> crate::agent::RetryPolicy {
        crate::agent::RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
        }
    }

    async fn agent_with(
        provider: Arc<ScriptedProvider>,
        max_iterations: usize,
    ) -> Agent {
        Agent::builder(provider)
            .with_config(AgentConfig {
                max_iterations,
                retry: fast_retry(),
                ..Default::default()
            })
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn immediate_final_answer_takes_one_step() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            r#"{"final_answer": "42"}"#.to_string()
        )]));
        let agent = agent_with(provider.clone(), 5).await;

        let result = agent.execute("what is 6 times 7", None).await;

        assert_eq!(result.terminated, TerminatedReason::Answered);
        assert_eq!(result.content, "42");
        assert_eq!(result.iterations_used, 1);
        assert_eq!(result.trace.len(), 1);
        assert!(matches!(
            result.trace.steps[0].action,
            StepAction::FinalAnswer { .. }
        ));
        assert!(result.trace.steps[0].observation.is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn unparsable_output_exhausts_the_budget() {
        let gibberish = || Ok("I am not sure how to proceed here.".to_string());
        let provider = Arc::new(ScriptedProvider::new(vec![
            gibberish(),
            gibberish(),
            gibberish(),
        ]));
        let agent = agent_with(provider, 3).await;

        let result = agent.execute("anything", None).await;

        assert_eq!(result.terminated, TerminatedReason::BudgetExhausted);
        assert_eq!(result.iterations_used, 3);
        assert_eq!(result.trace.len(), 3);
        for step in &result.trace.steps {
            assert!(matches!(step.action, StepAction::ParseFailure { .. }));
            let observation = step.observation.as_ref().unwrap();
            assert!(observation.content.contains("Could not interpret"));
        }
        // Budget exhaustion surfaces the last observation as partial content.
        assert!(result.content.contains("Could not interpret"));
    }

    #[tokio::test]
    async fn unknown_tool_is_recorded_and_fed_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(r#"{"tool": "search", "input": "x"}"#.to_string()),
            Ok(r#"{"final_answer": "done without search"}"#.to_string()),
        ]));
        let agent = agent_with(provider.clone(), 5).await;

        let result = agent.execute("find x", None).await;

        assert_eq!(result.terminated, TerminatedReason::Answered);
        assert_eq!(result.iterations_used, 2);

        let first = &result.trace.steps[0];
        let observation = first.observation.as_ref().unwrap();
        assert!(matches!(
            observation.error,
            Some(ToolError::NotFound { ref name }) if name == "search"
        ));

        // The failure is visible to the model on the next iteration.
        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Tool not found: search"));
    }

    #[tokio::test]
    async fn tool_observation_flows_into_the_next_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(r#"{"tool": "echo", "input": "hello"}"#.to_string()),
            Ok(r#"{"final_answer": "it said hello back"}"#.to_string()),
        ]));
        let agent = Agent::builder(provider.clone())
            .with_config(AgentConfig {
                retry: fast_retry(),
                ..Default::default()
            })
            .with_tool(Arc::new(EchoTool))
            .build()
            .await
            .unwrap();

        let result = agent.execute("say hello", None).await;

        assert_eq!(result.terminated, TerminatedReason::Answered);
        let observation = result.trace.steps[0].observation.as_ref().unwrap();
        assert!(observation.success);
        assert_eq!(observation.content, "echo: hello");

        assert!(provider.prompts()[1].contains("Observation: echo: hello"));
    }

    #[tokio::test]
    async fn budget_exhaustion_surfaces_last_observation() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(r#"{"tool": "echo", "input": "a"}"#.to_string()),
            Ok(r#"{"tool": "echo", "input": "b"}"#.to_string()),
        ]));
        let agent = Agent::builder(provider)
            .with_config(AgentConfig {
                max_iterations: 2,
                retry: fast_retry(),
                ..Default::default()
            })
            .with_tool(Arc::new(EchoTool))
            .build()
            .await
            .unwrap();

        let result = agent.execute("loop forever", None).await;

        assert_eq!(result.terminated, TerminatedReason::BudgetExhausted);
        assert_eq!(result.iterations_used, 2);
        assert_eq!(result.content, "echo: b");
    }

    #[tokio::test]
    async fn non_retryable_provider_error_is_fatal() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            ProviderError::Authentication {
                message: "bad key".to_string(),
            },
        )]));
        let agent = agent_with(provider.clone(), 5).await;

        let result = agent.execute("anything", None).await;

        assert_eq!(result.terminated, TerminatedReason::FatalError);
        assert_eq!(result.iterations_used, 0);
        assert!(result.trace.is_empty());
        assert!(result.content.is_empty());
        assert!(result.error.as_ref().unwrap().contains("Authentication"));
        // Non-retryable errors are not retried.
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn retryable_errors_are_retried_until_the_attempt_budget() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::RateLimit),
            Err(ProviderError::RateLimit),
            Err(ProviderError::RateLimit),
        ]));
        let agent = agent_with(provider.clone(), 5).await;

        let result = agent.execute("anything", None).await;

        assert_eq!(result.terminated, TerminatedReason::FatalError);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn provider_recovers_within_the_retry_budget() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Network {
                message: "connection reset".to_string(),
            }),
            Ok(r#"{"final_answer": "recovered"}"#.to_string()),
        ]));
        let agent = agent_with(provider.clone(), 5).await;

        let result = agent.execute("anything", None).await;

        assert_eq!(result.terminated, TerminatedReason::Answered);
        assert_eq!(result.content, "recovered");
        assert_eq!(result.iterations_used, 1);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_the_in_flight_model_call() {
        let agent = Agent::builder(Arc::new(StallingProvider))
            .build()
            .await
            .unwrap();

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = agent
            .execute_with_cancellation("anything", None, token)
            .await;

        assert_eq!(result.terminated, TerminatedReason::Cancelled);
        assert!(result.trace.is_empty());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn memory_is_recalled_and_written_at_finalization() {
        let memory = Arc::new(InMemoryStore::new());
        memory
            .set(
                "session:alice",
                "The user previously asked about Berlin.".to_string(),
                None,
            )
            .await
            .unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            r#"{"final_answer": "Berlin it is"}"#.to_string(),
        )]));
        let agent = Agent::builder(provider.clone())
            .with_memory(memory.clone())
            .build()
            .await
            .unwrap();

        let mut context = HashMap::new();
        context.insert("memory_key".to_string(), "session:alice".to_string());

        let result = agent.execute("pick a city", Some(context)).await;

        assert_eq!(result.terminated, TerminatedReason::Answered);
        assert!(provider.prompts()[0].contains("The user previously asked about Berlin."));

        let task_key = format!("task:{}", result.trace.execution_id);
        assert_eq!(
            memory.get(&task_key).await.unwrap(),
            Some("Berlin it is".to_string())
        );
        assert_eq!(
            memory.get("session:alice").await.unwrap(),
            Some("Berlin it is".to_string())
        );
    }

    #[tokio::test]
    async fn missing_memory_port_degrades_gracefully() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            r#"{"final_answer": "fine without memory"}"#.to_string(),
        )]));
        let agent = agent_with(provider, 5).await;

        let mut context = HashMap::new();
        context.insert("memory_key".to_string(), "session:bob".to_string());

        let result = agent.execute("anything", Some(context)).await;
        assert_eq!(result.terminated, TerminatedReason::Answered);
    }

    #[tokio::test]
    async fn concurrent_executions_keep_their_traces_apart() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(r#"{"final_answer": "one"}"#.to_string()),
            Ok(r#"{"final_answer": "two"}"#.to_string()),
        ]));
        let agent = Arc::new(agent_with(provider, 5).await);

        let (a, b) = tokio::join!(agent.execute("first", None), agent.execute("second", None));

        assert_eq!(a.terminated, TerminatedReason::Answered);
        assert_eq!(b.terminated, TerminatedReason::Answered);
        assert_ne!(a.trace.execution_id, b.trace.execution_id);
        assert_eq!(a.trace.len(), 1);
        assert_eq!(b.trace.len(), 1);
        assert_eq!(a.trace.task, "first");
        assert_eq!(b.trace.task, "second");
    }

    #[tokio::test]
    async fn duplicate_tools_are_rejected_at_build_time() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let result = Agent::builder(provider)
            .with_tool(Arc::new(EchoTool))
            .with_tool(Arc::new(EchoTool))
            .build()
            .await;

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::DuplicateTool { .. }))
        ));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_execution() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let result = Agent::builder(provider)
            .with_max_iterations(0)
            .build()
            .await;

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[tokio::test]
    async fn traces_are_persisted_through_the_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.json");

        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            r#"{"final_answer": "recorded"}"#.to_string(),
        )]));
        let agent = Agent::builder(provider)
            .with_trace_recorder(TraceRecorder::with_file(&path))
            .build()
            .await
            .unwrap();

        let result = agent.execute("persist me", None).await;
        assert_eq!(result.terminated, TerminatedReason::Answered);

        let archive = TraceRecorder::load(&path).await.unwrap();
        assert_eq!(archive.metadata.total_traces, 1);
        assert_eq!(archive.traces[0].execution_id, result.trace.execution_id);
    }

    #[tokio::test]
    async fn tools_added_after_construction_show_up_in_prompts() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            r#"{"final_answer": "ok"}"#.to_string(),
        )]));
        let agent = agent_with(provider.clone(), 5).await;

        agent.add_tool(Arc::new(EchoTool)).await.unwrap();
        assert_eq!(agent.list_tools().await.len(), 1);

        agent.execute("anything", None).await;
        assert!(provider.prompts()[0].contains("- echo: Echoes its input back"));
    }
}
