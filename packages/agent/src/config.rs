// ABOUTME: Tunable limits for one task session
// ABOUTME: Context thresholds and command ceilings are configuration, not literals

/// Limits enforced by the task loop. The context thresholds are soft: they
/// inject warnings into the transcript rather than terminating the loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Ceiling on executed container commands (and loop iterations)
    pub max_commands: u32,
    /// Message count above which a context warning is injected
    pub message_warning_threshold: usize,
    /// Estimated token count above which a context warning is injected
    pub token_warning_threshold: usize,
    /// Remaining-command window that triggers the finish-up warning
    pub finish_warning_window: u32,
    /// Maximum command output length included in the transcript
    pub max_output_chars: usize,
    /// Grace period handed to the engine when stopping the container
    pub stop_timeout_secs: i64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_commands: 100,
            message_warning_threshold: 25,
            token_warning_threshold: 2048,
            finish_warning_window: 10,
            max_output_chars: 10_000,
            stop_timeout_secs: 10,
        }
    }
}
