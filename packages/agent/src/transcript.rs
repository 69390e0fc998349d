// ABOUTME: Transcript wrapper with context metrics and wrapContext compaction
// ABOUTME: Keeps tool calls and their results adjacent and paired by id

use vessel_ai::{ToolCall, ToolResult, Turn};

/// Context pressure indicators recomputed every loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextMetrics {
    pub message_count: usize,
    pub estimated_tokens: usize,
}

/// Ordered conversation for one task session. The first entries (system
/// instruction plus task statement) form a fixed prefix that compaction
/// never removes.
pub struct Transcript {
    turns: Vec<Turn>,
    prefix_len: usize,
}

impl Transcript {
    pub fn new(system: impl Into<String>, task: impl Into<String>) -> Self {
        let turns = vec![Turn::system(system), Turn::task(task)];
        Self {
            prefix_len: turns.len(),
            turns,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn push_system(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::system(text));
    }

    /// Append an assistant tool call and its paired result as adjacent
    /// turns, so no unanswered call ever precedes the next model request
    pub fn record_tool_exchange(
        &mut self,
        call: ToolCall,
        assistant_text: Option<String>,
        result: impl Into<String>,
    ) {
        let result = ToolResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: result.into(),
        };
        self.turns.push(Turn::Assistant {
            text: assistant_text,
            tool_calls: vec![call],
        });
        self.turns.push(Turn::ToolResults {
            results: vec![result],
        });
    }

    /// Rough context pressure: 1 token ≈ 4 characters
    pub fn metrics(&self) -> ContextMetrics {
        let chars: usize = self.turns.iter().map(Turn::content_chars).sum();
        ContextMetrics {
            message_count: self.turns.len(),
            estimated_tokens: chars / 4,
        }
    }

    /// Irreversibly replace everything after the fixed prefix with a single
    /// synthetic summary entry, reclaiming context budget
    pub fn compact(&mut self, summary: &str) {
        self.turns.truncate(self.prefix_len);
        self.turns.push(Turn::system(format!(
            "Earlier conversation was compacted. Summary of progress so far: {}",
            summary
        )));
    }
}
