// ABOUTME: Closed tool schema and the parsed command sum type
// ABOUTME: Unknown names parse to None and are answered, never fatal

use serde::Deserialize;
use serde_json::json;
use vessel_ai::{FunctionDef, ToolCall};

use crate::plan::{ExecutionPlan, PlanStepUpdate};

pub const RUN_COMMAND: &str = "runCommand";
pub const COMPLETE_TASK: &str = "completeTask";
pub const FAIL_TASK: &str = "failTask";
pub const WRAP_CONTEXT: &str = "wrapContext";
pub const SET_EXECUTION_PLAN: &str = "setExecutionPlan";
pub const UPDATE_EXECUTION_PLAN: &str = "updateExecutionPlan";
pub const COPY_TO_CONTAINER: &str = "copyToContainer";
pub const COPY_FROM_CONTAINER: &str = "copyFromContainer";

/// Every command name in the closed set, for "unknown action" answers
pub const COMMAND_NAMES: [&str; 8] = [
    RUN_COMMAND,
    COMPLETE_TASK,
    FAIL_TASK,
    WRAP_CONTEXT,
    SET_EXECUTION_PLAN,
    UPDATE_EXECUTION_PLAN,
    COPY_TO_CONTAINER,
    COPY_FROM_CONTAINER,
];

/// Arguments of a runCommand call
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandArgs {
    pub command: String,
    pub working_dir: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// One model-requested action from the closed set
#[derive(Debug, Clone, PartialEq)]
pub enum TaskCommand {
    RunCommand(RunCommandArgs),
    CompleteTask { summary: String },
    FailTask { reason: String },
    WrapContext { summary: String },
    SetExecutionPlan { plan: ExecutionPlan },
    UpdateExecutionPlan { progress: Vec<PlanStepUpdate> },
    CopyToContainer { host_path: String, container_path: String },
    CopyFromContainer { container_path: String, host_path: String },
}

impl TaskCommand {
    /// Parse one tool call. `None` for names outside the closed set;
    /// `Some(Err)` when arguments do not deserialize.
    pub fn parse(call: &ToolCall) -> Option<serde_json::Result<TaskCommand>> {
        #[derive(Deserialize)]
        struct SummaryArgs {
            #[serde(default)]
            summary: String,
        }
        #[derive(Deserialize)]
        struct ReasonArgs {
            #[serde(default)]
            reason: String,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CopyArgs {
            host_path: String,
            container_path: String,
        }
        #[derive(Deserialize)]
        struct PlanArgs {
            plan: ExecutionPlan,
        }
        #[derive(Deserialize)]
        struct ProgressArgs {
            progress: Vec<PlanStepUpdate>,
        }

        let args = call.args.clone();
        let parsed = match call.name.as_str() {
            RUN_COMMAND => serde_json::from_value(args).map(TaskCommand::RunCommand),
            COMPLETE_TASK => serde_json::from_value::<SummaryArgs>(args)
                .map(|a| TaskCommand::CompleteTask { summary: a.summary }),
            FAIL_TASK => serde_json::from_value::<ReasonArgs>(args)
                .map(|a| TaskCommand::FailTask { reason: a.reason }),
            WRAP_CONTEXT => serde_json::from_value::<SummaryArgs>(args)
                .map(|a| TaskCommand::WrapContext { summary: a.summary }),
            SET_EXECUTION_PLAN => serde_json::from_value::<PlanArgs>(args)
                .map(|a| TaskCommand::SetExecutionPlan { plan: a.plan }),
            UPDATE_EXECUTION_PLAN => serde_json::from_value::<ProgressArgs>(args)
                .map(|a| TaskCommand::UpdateExecutionPlan {
                    progress: a.progress,
                }),
            COPY_TO_CONTAINER => {
                serde_json::from_value::<CopyArgs>(args).map(|a| TaskCommand::CopyToContainer {
                    host_path: a.host_path,
                    container_path: a.container_path,
                })
            }
            COPY_FROM_CONTAINER => {
                serde_json::from_value::<CopyArgs>(args).map(|a| TaskCommand::CopyFromContainer {
                    container_path: a.container_path,
                    host_path: a.host_path,
                })
            }
            _ => return None,
        };
        Some(parsed)
    }
}

/// The closed, model-facing tool schema for container tasks
pub fn container_tool_schema() -> Vec<FunctionDef> {
    vec![
        FunctionDef {
            name: RUN_COMMAND.to_string(),
            description: "Execute a shell command inside the task container".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Shell command line to execute"
                    },
                    "workingDir": {
                        "type": "string",
                        "description": "Working directory inside the container"
                    },
                    "reasoning": {
                        "type": "string",
                        "description": "Short explanation of why this command is needed"
                    }
                },
                "required": ["command"]
            }),
        },
        FunctionDef {
            name: COMPLETE_TASK.to_string(),
            description: "Mark the task as successfully completed".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "What was accomplished"
                    }
                },
                "required": ["summary"]
            }),
        },
        FunctionDef {
            name: FAIL_TASK.to_string(),
            description: "Mark the task as failed".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "reason": {
                        "type": "string",
                        "description": "Why the task cannot be completed"
                    }
                },
                "required": ["reason"]
            }),
        },
        FunctionDef {
            name: WRAP_CONTEXT.to_string(),
            description: "Replace the conversation so far with a summary to reclaim context budget"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "Complete summary of the work and state so far"
                    }
                },
                "required": ["summary"]
            }),
        },
        FunctionDef {
            name: SET_EXECUTION_PLAN.to_string(),
            description: "Record an ordered plan of steps for this task".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "plan": {
                        "type": "object",
                        "properties": {
                            "steps": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "id": {"type": "string"},
                                        "description": {"type": "string"},
                                        "state": {
                                            "type": "string",
                                            "enum": ["pending", "in-progress", "completed", "failed", "skipped"]
                                        }
                                    },
                                    "required": ["id", "description"]
                                }
                            }
                        },
                        "required": ["steps"]
                    }
                },
                "required": ["plan"]
            }),
        },
        FunctionDef {
            name: UPDATE_EXECUTION_PLAN.to_string(),
            description: "Update the state of steps in the recorded plan".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "progress": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "string"},
                                "state": {
                                    "type": "string",
                                    "enum": ["pending", "in-progress", "completed", "failed", "skipped"]
                                }
                            },
                            "required": ["id", "state"]
                        }
                    }
                },
                "required": ["progress"]
            }),
        },
        FunctionDef {
            name: COPY_TO_CONTAINER.to_string(),
            description: "Copy a host file or directory into the container (asks the user first)"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "hostPath": {
                        "type": "string",
                        "description": "Host path, relative to the project root"
                    },
                    "containerPath": {
                        "type": "string",
                        "description": "Destination path inside the container"
                    }
                },
                "required": ["hostPath", "containerPath"]
            }),
        },
        FunctionDef {
            name: COPY_FROM_CONTAINER.to_string(),
            description:
                "Copy a container path back to the host (lists contents and asks the user first)"
                    .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "containerPath": {
                        "type": "string",
                        "description": "Source path inside the container"
                    },
                    "hostPath": {
                        "type": "string",
                        "description": "Host destination, relative to the project root"
                    }
                },
                "required": ["containerPath", "hostPath"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::StepState;
    use serde_json::json;

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call-1".to_string(),
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn test_parse_run_command() {
        let parsed = TaskCommand::parse(&call(
            RUN_COMMAND,
            json!({"command": "ls -la", "workingDir": "/work", "reasoning": "inspect"}),
        ))
        .unwrap()
        .unwrap();

        match parsed {
            TaskCommand::RunCommand(args) => {
                assert_eq!(args.command, "ls -la");
                assert_eq!(args.working_dir.as_deref(), Some("/work"));
                assert_eq!(args.reasoning.as_deref(), Some("inspect"));
            }
            other => panic!("expected runCommand, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_name_is_none() {
        assert!(TaskCommand::parse(&call("launchMissiles", json!({}))).is_none());
    }

    #[test]
    fn test_parse_malformed_args_is_some_err() {
        let parsed = TaskCommand::parse(&call(RUN_COMMAND, json!({"cmd": "ls"})));
        assert!(matches!(parsed, Some(Err(_))));
    }

    #[test]
    fn test_parse_plan_commands() {
        let parsed = TaskCommand::parse(&call(
            SET_EXECUTION_PLAN,
            json!({"plan": {"steps": [{"id": "1", "description": "setup"}]}}),
        ))
        .unwrap()
        .unwrap();
        match parsed {
            TaskCommand::SetExecutionPlan { plan } => {
                assert_eq!(plan.steps.len(), 1);
                assert_eq!(plan.steps[0].state, StepState::Pending);
            }
            other => panic!("expected setExecutionPlan, got {:?}", other),
        }

        let parsed = TaskCommand::parse(&call(
            UPDATE_EXECUTION_PLAN,
            json!({"progress": [{"id": "1", "state": "completed"}]}),
        ))
        .unwrap()
        .unwrap();
        match parsed {
            TaskCommand::UpdateExecutionPlan { progress } => {
                assert_eq!(progress[0].state, StepState::Completed);
            }
            other => panic!("expected updateExecutionPlan, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_copy_commands() {
        let parsed = TaskCommand::parse(&call(
            COPY_FROM_CONTAINER,
            json!({"containerPath": "/workspace/out", "hostPath": "results"}),
        ))
        .unwrap()
        .unwrap();
        assert_eq!(
            parsed,
            TaskCommand::CopyFromContainer {
                container_path: "/workspace/out".to_string(),
                host_path: "results".to_string(),
            }
        );
    }

    #[test]
    fn test_schema_covers_the_closed_set() {
        let schema = container_tool_schema();
        let names: Vec<&str> = schema.iter().map(|def| def.name.as_str()).collect();
        assert_eq!(names, COMMAND_NAMES);
    }
}
