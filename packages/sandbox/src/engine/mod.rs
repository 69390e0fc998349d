// ABOUTME: Container engine capability trait and exec stream types
// ABOUTME: Abstract interface any engine with create/exec/archive support can satisfy

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod docker;

pub use docker::DockerEngine;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Container not found: {0}")]
    NotFound(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Container error: {0}")]
    Container(String),

    #[error("Exec error: {0}")]
    Exec(String),

    #[error("Transfer error: {0}")]
    Transfer(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Engine-assigned identifier of one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub id: String,
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One demultiplexed chunk of exec output
#[derive(Debug, Clone)]
pub struct OutputChunk {
    pub kind: StreamKind,
    pub data: Vec<u8>,
}

/// Parameters for one in-container command
#[derive(Debug, Clone)]
pub struct ExecSpec {
    /// Shell command line, run via `/bin/sh -c`
    pub command: String,
    pub working_dir: String,
    pub stdin: Option<String>,
}

impl ExecSpec {
    pub fn new(command: impl Into<String>, working_dir: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
            stdin: None,
        }
    }
}

/// A started exec: demultiplexed output stream plus the id used for
/// post-exec inspection. Dropping the stream tears down the local side.
pub struct ExecStream {
    pub exec_id: String,
    pub output: mpsc::UnboundedReceiver<OutputChunk>,
}

/// Capability interface over a container engine. Any engine that can
/// create/start/stop/inspect containers, exec with attached streams, and
/// put/get tar archives at a path is sufficient.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Pull an image, following progress until completion
    async fn pull_image(&self, image: &str) -> EngineResult<()>;

    /// Check whether an image exists locally
    async fn image_exists(&self, image: &str) -> EngineResult<bool>;

    /// Create a TTY-less container with an interactive shell entrypoint
    /// and auto-remove-on-stop
    async fn create_container(&self, image: &str) -> EngineResult<ContainerHandle>;

    async fn start_container(&self, handle: &ContainerHandle) -> EngineResult<()>;

    async fn stop_container(&self, handle: &ContainerHandle, timeout_secs: i64)
        -> EngineResult<()>;

    /// Whether the container currently runs; `NotFound` when the engine no
    /// longer knows the id
    async fn container_running(&self, handle: &ContainerHandle) -> EngineResult<bool>;

    /// Start a command with attached stdout/stderr (and stdin when supplied)
    async fn start_exec(&self, handle: &ContainerHandle, spec: &ExecSpec)
        -> EngineResult<ExecStream>;

    /// Exit code of a finished exec, when the engine reports one
    async fn exec_exit_code(&self, exec_id: &str) -> EngineResult<Option<i64>>;

    /// Upload a tar archive to be extracted at `container_path`
    async fn put_archive(
        &self,
        handle: &ContainerHandle,
        container_path: &str,
        archive: Vec<u8>,
    ) -> EngineResult<()>;

    /// Download `container_path` as a tar archive
    async fn get_archive(
        &self,
        handle: &ContainerHandle,
        container_path: &str,
    ) -> EngineResult<Vec<u8>>;
}
