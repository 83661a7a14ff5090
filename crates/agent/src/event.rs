//! Work-loop events surfaced to the interactive front end.
//!
//! `WorkEvent` wraps the loop's observable steps so a renderer can show
//! streamed text and tool lifecycle updates without reaching into session
//! internals. Text events carry the full snapshot accumulated so far, so a
//! dropped or stale event never corrupts the rendered view.

use codeclaw_core::message::{ToolProgressStatus, ToolResultStatus};
use serde::{Deserialize, Serialize};

/// Events emitted by the work loop while a turn runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkEvent {
    /// Snapshot of the assistant text streamed so far this turn.
    AiText { text: String },

    /// A tool call is being assembled mid-stream. `args` stays empty until
    /// the argument fragments parse as complete JSON.
    ToolPending {
        index: u32,
        name: Option<String>,
        args: Option<serde_json::Value>,
    },

    /// A tool call's lifecycle state changed.
    ToolProgress {
        progress_id: String,
        name: String,
        status: ToolProgressStatus,
        content: Option<String>,
    },

    /// A tool call settled with a result.
    ToolResult {
        tool_call_id: String,
        name: String,
        status: ToolResultStatus,
        content: String,
    },

    /// The turn failed; the same content is recorded in the timeline.
    Error { content: String },
}

impl WorkEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AiText { .. } => "ai_text",
            Self::ToolPending { .. } => "tool_pending",
            Self::ToolProgress { .. } => "tool_progress",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
        }
    }
}
