// ABOUTME: Error type for the task loop and handlers

use thiserror::Error;
use vessel_ai::GatewayError;
use vessel_sandbox::SandboxError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
