//! Session state: the persisted unit of conversation, configuration and
//! tool policy.
//!
//! A session exclusively owns its message timeline. The work loop borrows it
//! for one turn; the UI only ever submits new human messages or
//! confirm/decline signals through the methods here, which enforce the
//! monotonic tool-progress transitions in one place.

use crate::message::{Message, ToolCall, ToolProgressStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Session-level policy governing destructive tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolMode {
    /// Destructive tools require explicit user confirmation
    Confirm,
    /// Destructive tools are withheld from the model entirely
    ReadOnly,
    /// Destructive tools run without confirmation
    Yolo,
}

impl Default for ToolMode {
    fn default() -> Self {
        Self::Confirm
    }
}

impl std::fmt::Display for ToolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Confirm => "confirm",
            Self::ReadOnly => "read-only",
            Self::Yolo => "yolo",
        };
        write!(f, "{s}")
    }
}

/// Everything needed to construct (and memoize) a provider client.
///
/// Two sessions with equal options share one client handle; any field
/// difference forces a new handle.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOptions {
    /// Provider tag from the closed set ("ollama", "openai", ...)
    pub provider: String,

    /// Model name as the provider knows it
    pub model: String,

    /// Context budget in tokens for message trimming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_size: Option<u32>,

    /// Never serialized; session files must not carry secrets. Re-injected
    /// from configuration when a session is resumed.
    #[serde(skip)]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Skip agent-rule file discovery when building the system prompt
    #[serde(default)]
    pub disable_agent_rules: bool,
}

impl ProviderOptions {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            context_size: None,
            api_key: None,
            api_url: None,
            disable_agent_rules: false,
        }
    }
}

impl std::fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("context_size", &self.context_size)
            .field(
                "api_key",
                &self.api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_url", &self.api_url)
            .field("disable_agent_rules", &self.disable_agent_rules)
            .finish()
    }
}

/// A persisted conversation with its run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Sortable unique identifier (UUIDv7, time-ordered)
    pub id: String,

    /// Absolute path of the sandbox root
    pub work_dir: PathBuf,

    pub tool_mode: ToolMode,

    #[serde(rename = "chatServiceOptions")]
    pub provider_options: ProviderOptions,

    /// The append-only message timeline
    pub messages: Vec<Message>,

    /// Cursor into `messages`: everything before it belongs to completed
    /// turns. `finished < messages.len()` means a turn is still in progress
    /// (e.g. suspended awaiting confirmation).
    pub finished: usize,
}

impl Session {
    /// Create a fresh session.
    pub fn new(work_dir: impl Into<PathBuf>, tool_mode: ToolMode, options: ProviderOptions) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            work_dir: work_dir.into(),
            tool_mode,
            provider_options: options,
            messages: Vec::new(),
            finished: 0,
        }
    }

    /// Append a message to the timeline.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Mark every message as belonging to a completed turn.
    pub fn mark_finished(&mut self) {
        self.finished = self.messages.len();
    }

    /// Whether a turn is still in progress (suspended or interrupted).
    pub fn has_unfinished_turn(&self) -> bool {
        self.finished < self.messages.len()
    }

    /// Tool-progress entries currently blocking the turn, in timeline order.
    pub fn pending_confirmations(&self) -> Vec<(&str, &ToolCall)> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::ToolProgress {
                    id,
                    tool_call,
                    status: ToolProgressStatus::PendingConfirmation,
                    ..
                } => Some((id.as_str(), tool_call)),
                _ => None,
            })
            .collect()
    }

    /// Current status of a tool-progress entry.
    pub fn progress_status(&self, progress_id: &str) -> Option<ToolProgressStatus> {
        self.messages.iter().find_map(|m| match m {
            Message::ToolProgress { id, status, .. } if id == progress_id => Some(*status),
            _ => None,
        })
    }

    /// Advance a tool-progress entry, enforcing the monotonic transition
    /// rules. Returns false (and leaves the entry untouched) for an unknown
    /// id or a disallowed transition.
    pub fn advance_progress(
        &mut self,
        progress_id: &str,
        next: ToolProgressStatus,
        content: Option<String>,
    ) -> bool {
        for msg in &mut self.messages {
            if let Message::ToolProgress {
                id,
                status,
                content: slot,
                ..
            } = msg
            {
                if id == progress_id {
                    if !status.can_advance(next) {
                        return false;
                    }
                    *status = next;
                    if content.is_some() {
                        *slot = content;
                    }
                    return true;
                }
            }
        }
        false
    }

    /// Apply the user's confirm/decline decision to a suspended call.
    pub fn resolve_confirmation(&mut self, progress_id: &str, approve: bool) -> bool {
        let next = if approve {
            ToolProgressStatus::Confirmed
        } else {
            ToolProgressStatus::Declined
        };
        self.advance_progress(progress_id, next, None)
    }
}
