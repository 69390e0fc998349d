// ABOUTME: Container sandbox layer for Vessel task sessions
// ABOUTME: Engine abstraction, lifecycle, persisted id registry, transfer, and exec

pub mod engine;
pub mod error;
pub mod exec;
pub mod lifecycle;
pub mod registry;
pub mod transfer;

// Re-export engine surface
pub use engine::{
    ContainerEngine, ContainerHandle, DockerEngine, EngineError, EngineResult, ExecSpec,
    ExecStream, OutputChunk, StreamKind,
};

// Re-export errors
pub use error::{Result, SandboxError};

// Re-export command primitive
pub use exec::{execute_command, CommandOutcome, ABORT_MARKER};

// Re-export lifecycle operations
pub use lifecycle::{
    cleanup_orphaned_containers, create_and_start_container, pull_image, stop_container,
};

// Re-export registry
pub use registry::{ContainerRegistry, RegistryEntry};

// Re-export transfer operations
pub use transfer::{
    copy_from_container, copy_to_container, extract_archive, list_archive_files,
    list_files_in_container_archive, pack_archive, resolve_within_root,
};
