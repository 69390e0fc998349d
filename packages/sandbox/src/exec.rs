// ABOUTME: Command primitive running one shell command inside a container
// ABOUTME: Demultiplexes exec output and supports cooperative cancellation

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::{ContainerEngine, ContainerHandle, ExecSpec};
use crate::error::Result;

/// Marker appended to collected output when a command is aborted
pub const ABORT_MARKER: &str = "Aborted command execution";

/// Outcome of one in-container command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Concatenated stdout/stderr, trimmed
    pub output: String,
    pub exit_code: i64,
}

/// Run one shell command inside the container with an explicit working
/// directory and optional stdin.
///
/// Output chunks are appended in arrival order into a single string. On
/// cancellation the in-container process is killed best-effort (by command
/// string), the local stream is torn down, and the abort marker is appended
/// to the output instead of raising. The exit code comes from post-exec
/// inspection, defaulting to 0 when the engine reports none.
pub async fn execute_command(
    engine: &dyn ContainerEngine,
    handle: &ContainerHandle,
    command: &str,
    working_dir: &str,
    stdin: Option<String>,
    cancel: &CancellationToken,
) -> Result<CommandOutcome> {
    let spec = ExecSpec {
        command: command.to_string(),
        working_dir: working_dir.to_string(),
        stdin,
    };

    let mut stream = engine.start_exec(handle, &spec).await?;
    let exec_id = stream.exec_id.clone();

    let mut collected = String::new();

    let aborted = loop {
        tokio::select! {
            chunk = stream.output.recv() => {
                match chunk {
                    Some(chunk) => {
                        collected.push_str(&String::from_utf8_lossy(&chunk.data));
                    }
                    None => break false,
                }
            }
            _ = cancel.cancelled() => break true,
        }
    };

    if aborted {
        kill_command(engine, handle, command).await;
        // Tear down the local stream before reporting
        drop(stream);
        if !collected.is_empty() && !collected.ends_with('\n') {
            collected.push('\n');
        }
        collected.push_str(ABORT_MARKER);
    }

    let exit_code = match engine.exec_exit_code(&exec_id).await {
        Ok(code) => code.unwrap_or(0),
        Err(e) => {
            debug!("Exec inspection failed for {}: {}", exec_id, e);
            0
        }
    };

    Ok(CommandOutcome {
        output: collected.trim().to_string(),
        exit_code,
    })
}

/// Best-effort kill of the in-container process group by command string
async fn kill_command(engine: &dyn ContainerEngine, handle: &ContainerHandle, command: &str) {
    let spec = ExecSpec::new(format!("pkill -f {}", shell_escape(command)), "/");

    match engine.start_exec(handle, &spec).await {
        Ok(mut stream) => {
            // Drain so the kill exec runs to completion
            while stream.output.recv().await.is_some() {}
        }
        Err(e) => warn!("Best-effort kill failed for container {}: {}", handle.id, e),
    }
}

/// Escape a string for safe inclusion in a shell command
fn shell_escape(s: &str) -> String {
    if s.chars().all(|c| {
        c.is_alphanumeric() || c == '-' || c == '_' || c == '/' || c == '.' || c == ':' || c == '='
    }) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}
