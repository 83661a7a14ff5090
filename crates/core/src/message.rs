//! Conversation message types.
//!
//! The timeline is an append-only sequence of tagged messages:
//! User submits `Human` → the work loop streams an `Ai` reply → tool calls
//! surface as `ToolProgress` entries and settle into `ToolResult`s → repeat.
//! `System` is synthesized fresh for every model call and `Error` records
//! turn-level failures inline instead of crashing the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A structured request from the model to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this call, assigned by the provider
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON object, validated against the tool's schema
    /// before dispatch
    pub args: serde_json::Value,
}

/// A partial tool call observed mid-stream.
///
/// Providers emit argument JSON in fragments; chunks with the same `index`
/// belong to the same call and are merged by the streaming fold. Never
/// persisted — only finished [`ToolCall`]s reach the timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallChunk {
    /// Position of the call within the assistant turn
    pub index: u32,

    /// Call ID, present on the first fragment only
    pub id: Option<String>,

    /// Tool name, present on the first fragment only
    pub name: Option<String>,

    /// Raw argument JSON fragment to append
    pub args: String,
}

/// Outcome of a settled tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultStatus {
    Success,
    Error,
}

/// Lifecycle of a tool call as seen by the user.
///
/// Transitions are monotonic:
/// `Pending → (PendingConfirmation →) Confirmed | Declined → Success | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolProgressStatus {
    /// Call received from the model, not yet dispatched
    Pending,
    /// Destructive call waiting for the user's decision
    PendingConfirmation,
    /// User (or yolo mode) approved execution
    Confirmed,
    /// User refused execution
    Declined,
    /// Tool ran and returned a non-error result
    Success,
    /// Tool ran and failed, was denied, or could not be dispatched
    Error,
}

impl ToolProgressStatus {
    /// Whether moving to `next` is a permitted transition.
    pub fn can_advance(self, next: Self) -> bool {
        use ToolProgressStatus::*;
        matches!(
            (self, next),
            (Pending, PendingConfirmation)
                | (Pending, Confirmed)
                | (Pending, Declined)
                | (Pending, Success)
                | (Pending, Error)
                | (PendingConfirmation, Confirmed)
                | (PendingConfirmation, Declined)
                | (Confirmed, Success)
                | (Confirmed, Error)
                | (Declined, Error)
        )
    }

    /// True once the call can no longer change state.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// True while the loop must not proceed past this call.
    pub fn blocks_turn(self) -> bool {
        matches!(self, Self::PendingConfirmation)
    }
}

/// A single entry in the conversation timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Message {
    /// Text submitted by the user
    Human {
        id: String,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// A completed assistant reply, possibly carrying tool calls
    Ai {
        id: String,
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        timestamp: DateTime<Utc>,
    },

    /// The settled outcome of one tool call, fed back to the model
    ToolResult {
        id: String,
        tool_call_id: String,
        name: String,
        status: ToolResultStatus,
        content: String,
        timestamp: DateTime<Utc>,
    },

    /// User-facing view of a tool call's lifecycle; never sent to the model
    ToolProgress {
        id: String,
        tool_call: ToolCall,
        status: ToolProgressStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A turn-level failure rendered inline; never sent to the model
    Error {
        id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The system prompt, synthesized once per model call
    System {
        id: String,
        text: String,
        timestamp: DateTime<Utc>,
    },
}

impl Message {
    /// Create a new human message.
    pub fn human(text: impl Into<String>) -> Self {
        Self::Human {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a completed assistant message.
    pub fn ai(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Ai {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            tool_calls,
            timestamp: Utc::now(),
        }
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        status: ToolResultStatus,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            id: Uuid::new_v4().to_string(),
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            status,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a pending progress entry for a tool call.
    pub fn tool_progress(tool_call: ToolCall) -> Self {
        Self::ToolProgress {
            id: Uuid::new_v4().to_string(),
            tool_call,
            status: ToolProgressStatus::Pending,
            content: None,
            timestamp: Utc::now(),
        }
    }

    /// Create an error message.
    pub fn error(content: impl Into<String>, cause: Option<String>) -> Self {
        Self::Error {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            cause,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::System {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Stable unique identifier of this message.
    pub fn id(&self) -> &str {
        match self {
            Self::Human { id, .. }
            | Self::Ai { id, .. }
            | Self::ToolResult { id, .. }
            | Self::ToolProgress { id, .. }
            | Self::Error { id, .. }
            | Self::System { id, .. } => id,
        }
    }

    /// Uniform textual projection of any message kind.
    pub fn text(&self) -> &str {
        match self {
            Self::Human { text, .. } | Self::Ai { text, .. } | Self::System { text, .. } => text,
            Self::ToolResult { content, .. } | Self::Error { content, .. } => content,
            Self::ToolProgress { content, .. } => content.as_deref().unwrap_or(""),
        }
    }

    /// When the message was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Human { timestamp, .. }
            | Self::Ai { timestamp, .. }
            | Self::ToolResult { timestamp, .. }
            | Self::ToolProgress { timestamp, .. }
            | Self::Error { timestamp, .. }
            | Self::System { timestamp, .. } => *timestamp,
        }
    }

    /// Tool calls carried by an assistant message (empty for other kinds).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Ai { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Whether this message is valid model input.
    ///
    /// `Error` and `ToolProgress` are UI bookkeeping and are dropped during
    /// message preparation; `System` is regenerated fresh each call.
    pub fn is_model_input(&self) -> bool {
        matches!(
            self,
            Self::Human { .. } | Self::Ai { .. } | Self::ToolResult { .. }
        )
    }
}
