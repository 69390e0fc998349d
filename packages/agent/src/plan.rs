// ABOUTME: Execution plan maintained by the model for observability
// ABOUTME: Mutated only via the plan tool calls, never consulted by control flow

use serde::{Deserialize, Serialize};

/// State of one plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl Default for StepState {
    fn default() -> Self {
        StepState::Pending
    }
}

/// One step in an execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub state: StepState,
}

/// Ordered checklist the model maintains while working. Surfaced to
/// observers; the loop's control flow never consults it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<PlanStep>,
}

/// One progress update addressed by step id
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanStepUpdate {
    pub id: String,
    pub state: StepState,
}

impl ExecutionPlan {
    /// Apply progress updates; unknown step ids are ignored
    pub fn apply_progress(&mut self, updates: &[PlanStepUpdate]) {
        for update in updates {
            if let Some(step) = self.steps.iter_mut().find(|step| step.id == update.id) {
                step.state = update.state;
            }
        }
    }

    /// Compact human-readable checklist
    pub fn render(&self) -> String {
        self.steps
            .iter()
            .map(|step| {
                let mark = match step.state {
                    StepState::Pending => " ",
                    StepState::InProgress => ">",
                    StepState::Completed => "x",
                    StepState::Failed => "!",
                    StepState::Skipped => "-",
                };
                format!("[{}] {} {}", mark, step.id, step.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
