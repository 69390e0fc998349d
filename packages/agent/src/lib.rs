// ABOUTME: Model-driven container task loop for Vessel
// ABOUTME: Closed tool schema, handlers, context budgeting, and the session driver

pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod plan;
pub mod session;
pub mod transcript;

// Re-export the command surface
pub use commands::{container_tool_schema, RunCommandArgs, TaskCommand, COMMAND_NAMES};

// Re-export configuration
pub use config::AgentConfig;

// Re-export errors
pub use error::{AgentError, Result};

// Re-export handler types
pub use handlers::{HandlerContext, HandlerOutcome};

// Re-export the plan surface
pub use plan::{ExecutionPlan, PlanStep, PlanStepUpdate, StepState};

// Re-export the session driver
pub use session::{TaskOptions, TaskOutcome, TaskSession, COMMAND_LIMIT_SUMMARY};

// Re-export transcript types
pub use transcript::{ContextMetrics, Transcript};
