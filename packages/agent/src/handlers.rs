// ABOUTME: Handlers for the closed set of container task commands
// ABOUTME: Each consumes one tool call, produces side effects plus transcript entries

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vessel_ai::ToolCall;
use vessel_core::ConfirmGate;
use vessel_sandbox::{execute_command, transfer, ContainerEngine, ContainerHandle};

use crate::commands::{RunCommandArgs, TaskCommand, COMMAND_NAMES};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::plan::ExecutionPlan;
use crate::transcript::Transcript;

/// What one handler asks the loop to do next
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub success: Option<bool>,
    pub summary: Option<String>,
    pub commands_executed_increment: u32,
    pub should_break: bool,
}

impl HandlerOutcome {
    fn proceed() -> Self {
        Self {
            success: None,
            summary: None,
            commands_executed_increment: 0,
            should_break: false,
        }
    }

    fn terminate(success: bool, summary: String) -> Self {
        Self {
            success: Some(success),
            summary: Some(summary),
            commands_executed_increment: 0,
            should_break: true,
        }
    }
}

/// Shared state handed to every handler
pub struct HandlerContext<'a> {
    pub engine: &'a dyn ContainerEngine,
    pub handle: &'a ContainerHandle,
    pub transcript: &'a mut Transcript,
    pub plan: &'a mut Option<ExecutionPlan>,
    pub gate: &'a dyn ConfirmGate,
    pub config: &'a AgentConfig,
    pub project_root: &'a Path,
    pub default_working_dir: &'a str,
    pub cancel: &'a CancellationToken,
}

/// Standard answer for a tool call whose name is outside the closed set
pub fn unknown_action_answer(name: &str) -> String {
    format!(
        "Unknown action: {}. Available commands: {}.",
        name,
        COMMAND_NAMES.join(", ")
    )
}

/// Dispatch one parsed command. Engine failures during command execution
/// propagate (the loop's top-level safety net converts them into a failure
/// summary); transfer problems and declined confirmations are reported back
/// as tool-result strings instead, so the model can react.
pub async fn dispatch(
    call: &ToolCall,
    command: TaskCommand,
    ctx: &mut HandlerContext<'_>,
) -> Result<HandlerOutcome> {
    match command {
        TaskCommand::RunCommand(args) => run_command(call, args, ctx).await,
        TaskCommand::CompleteTask { summary } => {
            ctx.transcript
                .record_tool_exchange(call.clone(), None, "Task marked as complete.");
            Ok(HandlerOutcome::terminate(true, summary))
        }
        TaskCommand::FailTask { reason } => {
            ctx.transcript
                .record_tool_exchange(call.clone(), None, "Task marked as failed.");
            Ok(HandlerOutcome::terminate(false, reason))
        }
        TaskCommand::WrapContext { summary } => {
            info!("Compacting conversation context");
            ctx.transcript.compact(&summary);
            Ok(HandlerOutcome::proceed())
        }
        TaskCommand::SetExecutionPlan { plan } => {
            let rendered = plan.render();
            *ctx.plan = Some(plan);
            ctx.transcript.record_tool_exchange(
                call.clone(),
                None,
                format!("Execution plan recorded:\n{}", rendered),
            );
            Ok(HandlerOutcome::proceed())
        }
        TaskCommand::UpdateExecutionPlan { progress } => {
            let content = match ctx.plan.as_mut() {
                Some(plan) => {
                    plan.apply_progress(&progress);
                    format!("Execution plan updated:\n{}", plan.render())
                }
                None => "No execution plan to update. Call setExecutionPlan first.".to_string(),
            };
            ctx.transcript
                .record_tool_exchange(call.clone(), None, content);
            Ok(HandlerOutcome::proceed())
        }
        TaskCommand::CopyToContainer {
            host_path,
            container_path,
        } => copy_to(call, host_path, container_path, ctx).await,
        TaskCommand::CopyFromContainer {
            container_path,
            host_path,
        } => copy_from(call, container_path, host_path, ctx).await,
    }
}

async fn run_command(
    call: &ToolCall,
    args: RunCommandArgs,
    ctx: &mut HandlerContext<'_>,
) -> Result<HandlerOutcome> {
    let working_dir = args
        .working_dir
        .as_deref()
        .unwrap_or(ctx.default_working_dir);

    let outcome = execute_command(
        ctx.engine,
        ctx.handle,
        &args.command,
        working_dir,
        None,
        ctx.cancel,
    )
    .await?;

    let output = truncate_output(&outcome.output, ctx.config.max_output_chars);
    let content = if output.is_empty() {
        format!("Command exited with code {}.", outcome.exit_code)
    } else {
        format!("Command exited with code {}.\n{}", outcome.exit_code, output)
    };

    ctx.transcript
        .record_tool_exchange(call.clone(), args.reasoning.clone(), content);

    Ok(HandlerOutcome {
        success: None,
        summary: None,
        commands_executed_increment: 1,
        should_break: false,
    })
}

async fn copy_to(
    call: &ToolCall,
    host_path: String,
    container_path: String,
    ctx: &mut HandlerContext<'_>,
) -> Result<HandlerOutcome> {
    let decision = ctx
        .gate
        .confirm(
            &format!(
                "Copy {} into the container at {}?",
                host_path, container_path
            ),
            false,
            true,
        )
        .await;

    let content = if !decision.confirmed {
        warn!("Host-to-container transfer declined: {}", host_path);
        "Transfer declined by user.".to_string()
    } else {
        match transfer::copy_to_container(
            ctx.engine,
            ctx.handle,
            Path::new(&host_path),
            &container_path,
            ctx.project_root,
        )
        .await
        {
            Ok(()) => format!("Copied {} to {}.", host_path, container_path),
            Err(e) => format!("Transfer failed: {}", e),
        }
    };

    ctx.transcript
        .record_tool_exchange(call.clone(), None, content);
    Ok(HandlerOutcome::proceed())
}

async fn copy_from(
    call: &ToolCall,
    container_path: String,
    host_path: String,
    ctx: &mut HandlerContext<'_>,
) -> Result<HandlerOutcome> {
    // List the archive first so the user confirms against actual contents;
    // the transfer itself never runs silently.
    let content =
        match transfer::list_files_in_container_archive(ctx.engine, ctx.handle, &container_path)
            .await
        {
            Err(e) => format!("Transfer failed: {}", e),
            Ok(files) => {
                let prompt = format!(
                    "Copy {} file(s) from the container at {} to {}?\n  {}",
                    files.len(),
                    container_path,
                    host_path,
                    files.join("\n  ")
                );
                let decision = ctx.gate.confirm(&prompt, false, true).await;

                if !decision.confirmed {
                    warn!("Container-to-host transfer declined: {}", container_path);
                    "Transfer declined by user.".to_string()
                } else {
                    match transfer::copy_from_container(
                        ctx.engine,
                        ctx.handle,
                        &container_path,
                        Path::new(&host_path),
                        ctx.project_root,
                    )
                    .await
                    {
                        Ok(written) => format!(
                            "Copied {} file(s) from {} to {}.",
                            written.len(),
                            container_path,
                            host_path
                        ),
                        Err(e) => format!("Transfer failed: {}", e),
                    }
                }
            }
        };

    ctx.transcript
        .record_tool_exchange(call.clone(), None, content);
    Ok(HandlerOutcome::proceed())
}

fn truncate_output(output: &str, max_chars: usize) -> String {
    if output.len() <= max_chars {
        return output.to_string();
    }
    let mut cut = max_chars;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n... [output truncated]", &output[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_output_short_passthrough() {
        assert_eq!(truncate_output("hello", 100), "hello");
    }

    #[test]
    fn test_truncate_output_long_gets_marker() {
        let long = "a".repeat(200);
        let truncated = truncate_output(&long, 50);
        assert!(truncated.starts_with(&"a".repeat(50)));
        assert!(truncated.ends_with("... [output truncated]"));
    }

    #[test]
    fn test_truncate_output_respects_char_boundaries() {
        let text = "héllo wörld".repeat(20);
        let truncated = truncate_output(&text, 7);
        assert!(truncated.ends_with("... [output truncated]"));
    }

    #[test]
    fn test_unknown_action_answer_lists_commands() {
        let answer = unknown_action_answer("launchMissiles");
        assert!(answer.contains("launchMissiles"));
        assert!(answer.contains("runCommand"));
        assert!(answer.contains("copyFromContainer"));
    }
}
