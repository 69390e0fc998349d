// ABOUTME: User confirmation gates for destructive or retryable operations
// ABOUTME: Trait plus terminal (inquire) and fixed-answer implementations

use async_trait::async_trait;
use inquire::{Confirm, Text};
use tracing::warn;

/// Outcome of one confirmation prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub confirmed: bool,
    /// Free-form answer collected alongside the confirmation, when requested
    pub answer: Option<String>,
}

impl Confirmation {
    pub fn yes() -> Self {
        Self {
            confirmed: true,
            answer: None,
        }
    }

    pub fn no() -> Self {
        Self {
            confirmed: false,
            answer: None,
        }
    }
}

/// Gate consulted before any host↔container transfer and before retrying a
/// failed model call. Implementations decide how the question reaches the
/// user (terminal, UI, or a fixed policy for non-interactive sessions).
#[async_trait]
pub trait ConfirmGate: Send + Sync {
    async fn confirm(&self, prompt: &str, include_answer: bool, default: bool) -> Confirmation;
}

/// Terminal-backed gate using inquire prompts
pub struct TerminalGate;

#[async_trait]
impl ConfirmGate for TerminalGate {
    async fn confirm(&self, prompt: &str, include_answer: bool, default: bool) -> Confirmation {
        let prompt = prompt.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let confirmed = Confirm::new(&prompt)
                .with_default(default)
                .prompt()
                .unwrap_or(default);

            let answer = if confirmed && include_answer {
                Text::new("Additional context (optional):")
                    .prompt()
                    .ok()
                    .filter(|answer| !answer.is_empty())
            } else {
                None
            };

            Confirmation { confirmed, answer }
        })
        .await;

        result.unwrap_or_else(|e| {
            warn!("Confirmation prompt task failed: {}", e);
            Confirmation {
                confirmed: default,
                answer: None,
            }
        })
    }
}

/// Gate with a fixed answer, for non-interactive sessions and tests
pub struct AutoGate {
    confirmed: bool,
}

impl AutoGate {
    pub fn new(confirmed: bool) -> Self {
        Self { confirmed }
    }
}

#[async_trait]
impl ConfirmGate for AutoGate {
    async fn confirm(&self, _prompt: &str, _include_answer: bool, _default: bool) -> Confirmation {
        Confirmation {
            confirmed: self.confirmed,
            answer: None,
        }
    }
}
