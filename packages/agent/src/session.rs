// ABOUTME: The command execution loop driving one container task session
// ABOUTME: Context budgeting, model calls via fallback, dispatch, teardown on every exit

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vessel_ai::{
    call_with_fallback, FallbackOptions, GenerateRequest, ModelGateway, ModelTier, Part,
    ResponseType, ResponseValidator, ToolCall, Turn,
};
use vessel_core::{ConfirmGate, PauseGate};
use vessel_sandbox::{lifecycle, ContainerEngine, ContainerHandle, ContainerRegistry};

use crate::commands::{container_tool_schema, TaskCommand, RUN_COMMAND};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::handlers::{dispatch, unknown_action_answer, HandlerContext};
use crate::plan::ExecutionPlan;
use crate::transcript::Transcript;

/// Summary reported when a runCommand request arrives past the ceiling
pub const COMMAND_LIMIT_SUMMARY: &str = "Task incomplete: Reached maximum command limit";

/// Inputs for one container task
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// What the model is asked to accomplish
    pub task: String,
    /// Container image the session runs in
    pub image: String,
    /// Initial working directory inside the container
    pub working_dir: String,
    /// Host project root bounding every transfer path
    pub project_root: PathBuf,
    pub fallback: FallbackOptions,
    pub config: AgentConfig,
}

/// Final state of one task session
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub success: bool,
    pub summary: String,
    pub commands_executed: u32,
    pub transcript: Vec<Turn>,
    pub plan: Option<ExecutionPlan>,
}

/// One container's worth of model-directed work, from creation to teardown
pub struct TaskSession<'a> {
    engine: &'a dyn ContainerEngine,
    gateway: &'a dyn ModelGateway,
    validator: &'a dyn ResponseValidator,
    gate: &'a dyn ConfirmGate,
    registry: &'a ContainerRegistry,
    pause: PauseGate,
    cancel: CancellationToken,
    options: TaskOptions,
}

impl<'a> TaskSession<'a> {
    pub fn new(
        engine: &'a dyn ContainerEngine,
        gateway: &'a dyn ModelGateway,
        validator: &'a dyn ResponseValidator,
        gate: &'a dyn ConfirmGate,
        registry: &'a ContainerRegistry,
        options: TaskOptions,
    ) -> Self {
        Self {
            engine,
            gateway,
            validator,
            gate,
            registry,
            pause: PauseGate::default(),
            cancel: CancellationToken::new(),
            options,
        }
    }

    /// Install the cooperative pause checkpoint awaited before each iteration
    pub fn with_pause_gate(mut self, pause: PauseGate) -> Self {
        self.pause = pause;
        self
    }

    /// Install the cancellation token observed by the loop and every command
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the task to completion. Image pull failure is fatal and creates
    /// no container. Once a container exists it is stopped and unregistered
    /// on every exit path, including errors.
    pub async fn run(mut self) -> Result<TaskOutcome> {
        lifecycle::pull_image(self.engine, &self.options.image).await?;

        let handle = lifecycle::create_and_start_container(
            self.engine,
            self.registry,
            &self.options.image,
        )
        .await?;
        info!(
            "Task session started in container {} ({})",
            handle.id, self.options.image
        );

        let stop_timeout = self.options.config.stop_timeout_secs;
        let outcome = self.drive(&handle).await;
        lifecycle::stop_container(self.engine, self.registry, &handle, stop_timeout).await;
        outcome
    }

    async fn drive(&mut self, handle: &ContainerHandle) -> Result<TaskOutcome> {
        let mut transcript = Transcript::new(
            system_prompt(),
            task_statement(&self.options.task, &self.options.working_dir),
        );
        let mut plan: Option<ExecutionPlan> = None;
        let mut commands_executed: u32 = 0;
        let mut success: Option<bool> = None;
        let mut summary: Option<String> = None;

        let request = GenerateRequest {
            function_defs: container_tool_schema(),
            model_tier: ModelTier::Lite,
            required_function_name: None,
            expected_response_type: ResponseType::FunctionCall,
        };

        'outer: for _iteration in 0..self.options.config.max_commands {
            self.pause.wait_if_paused().await;
            if self.cancel.is_cancelled() {
                warn!("Task cancelled before iteration");
                success = Some(false);
                summary = Some("Task aborted".to_string());
                break;
            }

            self.inject_context_guidance(&mut transcript, commands_executed);

            let parts = match call_with_fallback(
                self.gateway,
                self.validator,
                self.gate,
                &self.options.fallback,
                transcript.turns(),
                &request,
            )
            .await
            {
                Ok(parts) => parts,
                Err(e) => {
                    error!("Task iteration failed: {}", e);
                    success = Some(false);
                    summary = Some(format!("Task failed: {}", e));
                    break;
                }
            };

            let text_parts: Vec<&str> = parts.iter().filter_map(Part::as_text).collect();
            let text = if text_parts.is_empty() {
                None
            } else {
                Some(text_parts.join("\n"))
            };
            let calls: Vec<ToolCall> = parts
                .iter()
                .filter_map(Part::as_tool_call)
                .cloned()
                .collect();

            if calls.is_empty() {
                debug!("Model returned no tool call");
                transcript.push(Turn::Assistant {
                    text,
                    tool_calls: vec![],
                });
                transcript.push_system(
                    "Could not determine the next action. Respond with exactly one of the \
                     available commands.",
                );
                continue;
            }

            for call in calls {
                if call.name == RUN_COMMAND
                    && commands_executed >= self.options.config.max_commands
                {
                    warn!("Command limit reached, stopping the session");
                    success = Some(false);
                    summary = Some(COMMAND_LIMIT_SUMMARY.to_string());
                    break 'outer;
                }

                let command = match TaskCommand::parse(&call) {
                    None => {
                        warn!("Unknown command requested: {}", call.name);
                        let answer = unknown_action_answer(&call.name);
                        transcript.record_tool_exchange(call, None, answer);
                        continue;
                    }
                    Some(Err(e)) => {
                        let answer = format!("Invalid arguments for {}: {}", call.name, e);
                        transcript.record_tool_exchange(call, None, answer);
                        continue;
                    }
                    Some(Ok(command)) => command,
                };

                let mut ctx = HandlerContext {
                    engine: self.engine,
                    handle,
                    transcript: &mut transcript,
                    plan: &mut plan,
                    gate: self.gate,
                    config: &self.options.config,
                    project_root: &self.options.project_root,
                    default_working_dir: &self.options.working_dir,
                    cancel: &self.cancel,
                };

                match dispatch(&call, command, &mut ctx).await {
                    Ok(outcome) => {
                        commands_executed += outcome.commands_executed_increment;
                        if outcome.success.is_some() {
                            success = outcome.success;
                        }
                        if outcome.summary.is_some() {
                            summary = outcome.summary;
                        }
                        if outcome.should_break {
                            break 'outer;
                        }
                    }
                    Err(e) => {
                        error!("Command handler failed: {}", e);
                        success = Some(false);
                        summary = Some(format!("Task failed: {}", e));
                        break 'outer;
                    }
                }
            }
        }

        let success = success.unwrap_or(false);
        let summary = summary
            .unwrap_or_else(|| "Task ended without an explicit completion signal".to_string());
        info!(
            "Task session finished: success={}, commands={}, summary={}",
            success, commands_executed, summary
        );

        Ok(TaskOutcome {
            success,
            summary,
            commands_executed,
            transcript: transcript.into_turns(),
            plan,
        })
    }

    /// Metrics line, soft context warnings, and the finish-up warning
    fn inject_context_guidance(&self, transcript: &mut Transcript, commands_executed: u32) {
        let config = &self.options.config;
        let metrics = transcript.metrics();

        transcript.push_system(format!(
            "Context status: {} messages, about {} tokens.",
            metrics.message_count, metrics.estimated_tokens
        ));

        let over_messages = metrics.message_count > config.message_warning_threshold;
        let over_tokens = metrics.estimated_tokens > config.token_warning_threshold;

        if over_messages {
            transcript.push_system(format!(
                "Warning: the conversation has {} messages (soft limit {}). Call wrapContext \
                 with a summary of progress to stay within budget.",
                metrics.message_count, config.message_warning_threshold
            ));
        }
        if over_tokens {
            transcript.push_system(format!(
                "Warning: the conversation uses about {} tokens (soft limit {}). Call \
                 wrapContext with a summary of progress to stay within budget.",
                metrics.estimated_tokens, config.token_warning_threshold
            ));
        }
        if over_messages && over_tokens {
            transcript.push_system(
                "Context budget exceeded on both limits. You must call wrapContext with a \
                 summary before taking any other action.",
            );
        }

        let remaining = config.max_commands.saturating_sub(commands_executed);
        if remaining <= config.finish_warning_window {
            transcript.push_system(format!(
                "Only {} command(s) remain before the limit. Start finishing up: complete or \
                 fail the task soon.",
                remaining
            ));
        }
    }
}

fn system_prompt() -> String {
    [
        "You operate an isolated Linux container to accomplish a task.",
        "Work in small steps: inspect state, act, then verify.",
        "Respond to every turn with a tool call.",
        "runCommand executes a shell command and returns its output and exit code.",
        "completeTask and failTask end the session.",
        "wrapContext replaces the conversation with your summary when the context budget runs low.",
        "setExecutionPlan and updateExecutionPlan maintain a checklist visible to observers.",
        "copyToContainer and copyFromContainer move files across the host boundary; every \
         transfer requires explicit user confirmation.",
    ]
    .join(" ")
}

fn task_statement(task: &str, working_dir: &str) -> String {
    format!(
        "Task: {}\nInitial working directory: {}",
        task, working_dir
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::COMPLETE_TASK;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use vessel_ai::{GatewayError, GatewayResult, PassthroughValidator};
    use vessel_core::AutoGate;
    use vessel_sandbox::{EngineError, EngineResult, ExecSpec, ExecStream, OutputChunk, StreamKind};

    /// Gateway that pops scripted responses in order
    pub(crate) struct ScriptedGateway {
        responses: Mutex<VecDeque<GatewayResult<Vec<Part>>>>,
    }

    impl ScriptedGateway {
        pub(crate) fn new(responses: Vec<GatewayResult<Vec<Part>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn generate_content(
            &self,
            _transcript: &[Turn],
            _request: &GenerateRequest,
        ) -> GatewayResult<Vec<Part>> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(GatewayError::Provider(
                        "gateway called past the scripted responses".to_string(),
                    ))
                })
        }
    }

    /// Engine whose execs succeed immediately with a fixed output
    #[derive(Default)]
    pub(crate) struct LoopEngine {
        pub exec_count: Mutex<u32>,
        pub stopped: Mutex<Vec<String>>,
        pub exec_fails: bool,
    }

    #[async_trait]
    impl ContainerEngine for LoopEngine {
        async fn pull_image(&self, _image: &str) -> EngineResult<()> {
            Ok(())
        }
        async fn image_exists(&self, _image: &str) -> EngineResult<bool> {
            Ok(true)
        }
        async fn create_container(&self, _image: &str) -> EngineResult<ContainerHandle> {
            Ok(ContainerHandle::new("loop-engine"))
        }
        async fn start_container(&self, _handle: &ContainerHandle) -> EngineResult<()> {
            Ok(())
        }
        async fn stop_container(
            &self,
            handle: &ContainerHandle,
            _timeout_secs: i64,
        ) -> EngineResult<()> {
            self.stopped.lock().unwrap().push(handle.id.clone());
            Ok(())
        }
        async fn container_running(&self, _handle: &ContainerHandle) -> EngineResult<bool> {
            Ok(true)
        }

        async fn start_exec(
            &self,
            _handle: &ContainerHandle,
            spec: &ExecSpec,
        ) -> EngineResult<ExecStream> {
            if self.exec_fails {
                return Err(EngineError::Exec("exec transport broken".to_string()));
            }
            if !spec.command.starts_with("pkill") {
                *self.exec_count.lock().unwrap() += 1;
            }
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let _ = tx.send(OutputChunk {
                kind: StreamKind::Stdout,
                data: b"ok\n".to_vec(),
            });
            drop(tx);
            Ok(ExecStream {
                exec_id: "exec".to_string(),
                output: rx,
            })
        }

        async fn exec_exit_code(&self, _exec_id: &str) -> EngineResult<Option<i64>> {
            Ok(Some(0))
        }

        async fn put_archive(
            &self,
            _handle: &ContainerHandle,
            _container_path: &str,
            _archive: Vec<u8>,
        ) -> EngineResult<()> {
            Ok(())
        }
        async fn get_archive(
            &self,
            _handle: &ContainerHandle,
            _container_path: &str,
        ) -> EngineResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    pub(crate) fn tool_call(name: &str, args: serde_json::Value) -> Part {
        Part::FunctionCall(ToolCall {
            id: format!("call-{}", name),
            name: name.to_string(),
            args,
        })
    }

    fn options(project_root: std::path::PathBuf, max_commands: u32) -> TaskOptions {
        TaskOptions {
            task: "verify the build".to_string(),
            image: "alpine:latest".to_string(),
            working_dir: "/workspace".to_string(),
            project_root,
            fallback: FallbackOptions {
                disable_fallback: false,
                interactive: false,
            },
            config: AgentConfig {
                max_commands,
                ..AgentConfig::default()
            },
        }
    }

    async fn run_session(
        engine: &LoopEngine,
        gateway: &ScriptedGateway,
        max_commands: u32,
    ) -> TaskOutcome {
        let dir = tempfile::tempdir().unwrap();
        let registry = ContainerRegistry::with_path(dir.path().join("containers.json"));
        let gate = AutoGate::new(true);
        let session = TaskSession::new(
            engine,
            gateway,
            &PassthroughValidator,
            &gate,
            &registry,
            options(dir.path().to_path_buf(), max_commands),
        );
        let outcome = session.run().await.unwrap();
        assert!(registry.entries().unwrap().is_empty());
        outcome
    }

    #[tokio::test]
    async fn test_immediate_complete_task() {
        let engine = LoopEngine::default();
        let gateway = ScriptedGateway::new(vec![Ok(vec![tool_call(
            COMPLETE_TASK,
            json!({"summary": "ok"}),
        )])]);

        let outcome = run_session(&engine, &gateway, 100).await;

        assert!(outcome.success);
        assert_eq!(outcome.summary, "ok");
        assert_eq!(outcome.commands_executed, 0);
        assert_eq!(*engine.exec_count.lock().unwrap(), 0);
        assert_eq!(engine.stopped.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_command_limit_interception() {
        let engine = LoopEngine::default();
        // One response with three runCommand calls against a ceiling of two
        let gateway = ScriptedGateway::new(vec![Ok(vec![
            tool_call(RUN_COMMAND, json!({"command": "echo 1"})),
            tool_call(RUN_COMMAND, json!({"command": "echo 2"})),
            tool_call(RUN_COMMAND, json!({"command": "echo 3"})),
        ])]);

        let outcome = run_session(&engine, &gateway, 2).await;

        assert!(!outcome.success);
        assert_eq!(outcome.summary, COMMAND_LIMIT_SUMMARY);
        assert_eq!(outcome.commands_executed, 2);
        // The third runCommand handler was never invoked
        assert_eq!(*engine.exec_count.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_command_is_answered_and_loop_continues() {
        let engine = LoopEngine::default();
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![tool_call("launchMissiles", json!({}))]),
            Ok(vec![tool_call(COMPLETE_TASK, json!({"summary": "done"}))]),
        ]);

        let outcome = run_session(&engine, &gateway, 100).await;

        assert!(outcome.success);
        assert_eq!(outcome.summary, "done");
        let answered = outcome.transcript.iter().any(|turn| match turn {
            Turn::ToolResults { results } => results
                .iter()
                .any(|r| r.content.contains("Unknown action: launchMissiles")),
            _ => false,
        });
        assert!(answered, "unknown action must be answered in the transcript");
    }

    #[tokio::test]
    async fn test_no_tool_call_appends_pair_and_continues() {
        let engine = LoopEngine::default();
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![Part::Text("thinking out loud".to_string())]),
            Ok(vec![tool_call(COMPLETE_TASK, json!({"summary": "done"}))]),
        ]);

        let outcome = run_session(&engine, &gateway, 100).await;

        assert!(outcome.success);
        let nudged = outcome.transcript.iter().any(|turn| match turn {
            Turn::System { text } => text.contains("Could not determine the next action"),
            _ => false,
        });
        assert!(nudged);
    }

    #[tokio::test]
    async fn test_gateway_error_becomes_failure_summary() {
        let engine = LoopEngine::default();
        let gateway = ScriptedGateway::new(vec![Err(GatewayError::Provider(
            "model unreachable".to_string(),
        ))]);

        let outcome = run_session(&engine, &gateway, 100).await;

        assert!(!outcome.success);
        assert!(outcome.summary.contains("Task failed"));
        assert!(outcome.summary.contains("model unreachable"));
        // Teardown still ran
        assert_eq!(engine.stopped.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_handler_error_aborts_with_failure_summary() {
        let engine = LoopEngine {
            exec_fails: true,
            ..Default::default()
        };
        let gateway = ScriptedGateway::new(vec![Ok(vec![tool_call(
            RUN_COMMAND,
            json!({"command": "echo hi"}),
        )])]);

        let outcome = run_session(&engine, &gateway, 100).await;

        assert!(!outcome.success);
        assert!(outcome.summary.contains("exec transport broken"));
    }

    #[tokio::test]
    async fn test_wrap_context_compacts_transcript() {
        let engine = LoopEngine::default();
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![tool_call(RUN_COMMAND, json!({"command": "ls"}))]),
            Ok(vec![tool_call(
                crate::commands::WRAP_CONTEXT,
                json!({"summary": "halfway: files listed"}),
            )]),
            Ok(vec![tool_call(COMPLETE_TASK, json!({"summary": "done"}))]),
        ]);

        let outcome = run_session(&engine, &gateway, 100).await;

        assert!(outcome.success);
        let compacted = outcome.transcript.iter().any(|turn| match turn {
            Turn::System { text } => text.contains("halfway: files listed"),
            _ => false,
        });
        assert!(compacted);
        // The pre-compaction command exchange is gone
        let old_exchange = outcome.transcript.iter().any(|turn| match turn {
            Turn::ToolResults { results } => results.iter().any(|r| r.name == RUN_COMMAND),
            _ => false,
        });
        assert!(!old_exchange, "compaction must drop the old exchanges");
    }

    #[tokio::test]
    async fn test_cancellation_before_iteration_aborts() {
        let engine = LoopEngine::default();
        let gateway = ScriptedGateway::new(vec![]);
        let dir = tempfile::tempdir().unwrap();
        let registry = ContainerRegistry::with_path(dir.path().join("containers.json"));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let gate = AutoGate::new(true);
        let session = TaskSession::new(
            &engine,
            &gateway,
            &PassthroughValidator,
            &gate,
            &registry,
            options(dir.path().to_path_buf(), 100),
        )
        .with_cancellation(cancel);

        let outcome = session.run().await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.summary, "Task aborted");
        assert_eq!(engine.stopped.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_plan_commands_record_and_update() {
        let engine = LoopEngine::default();
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![tool_call(
                crate::commands::SET_EXECUTION_PLAN,
                json!({"plan": {"steps": [
                    {"id": "1", "description": "inspect"},
                    {"id": "2", "description": "build"}
                ]}}),
            )]),
            Ok(vec![tool_call(
                crate::commands::UPDATE_EXECUTION_PLAN,
                json!({"progress": [{"id": "1", "state": "completed"}]}),
            )]),
            Ok(vec![tool_call(COMPLETE_TASK, json!({"summary": "done"}))]),
        ]);

        let outcome = run_session(&engine, &gateway, 100).await;

        assert!(outcome.success);
        let plan = outcome.plan.expect("plan must be recorded");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].state, crate::plan::StepState::Completed);
        assert_eq!(plan.steps[1].state, crate::plan::StepState::Pending);
    }
}
