//! Streaming fold: assembling an assistant message from provider chunks.
//!
//! Providers emit text deltas and tool-call argument fragments at arbitrary
//! chunk boundaries. [`accumulate`] folds them into a [`PartialAiMessage`];
//! the work loop finalizes the partial into a timeline [`Message`] once the
//! stream ends.

use codeclaw_core::message::{Message, ToolCall};
use codeclaw_core::provider::{StreamChunk, Usage};
use std::collections::BTreeMap;
use uuid::Uuid;

/// An assistant reply under assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialAiMessage {
    /// Concatenated text deltas so far
    pub text: String,

    /// Tool calls under assembly, keyed by stream index
    calls: BTreeMap<u32, PartialToolCall>,

    /// Usage totals, if the provider reported them
    pub usage: Option<Usage>,

    /// Whether the terminal chunk has been observed
    pub done: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    args: String,
}

/// A point-in-time view of one call under assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPreview {
    pub index: u32,
    pub name: Option<String>,
    pub args: Option<serde_json::Value>,
}

/// Fold one stream chunk into the accumulator.
///
/// Pure: `None` starts a fresh accumulator and folding the same chunk
/// sequence always yields the same partial. Tool fragments merge by index;
/// `id` and `name` stick from the first fragment carrying them, argument
/// text concatenates in arrival order.
pub fn accumulate(previous: Option<PartialAiMessage>, chunk: &StreamChunk) -> PartialAiMessage {
    let mut partial = previous.unwrap_or_default();

    if let Some(content) = &chunk.content {
        partial.text.push_str(content);
    }

    for delta in &chunk.tool_call_chunks {
        let call = partial.calls.entry(delta.index).or_default();
        if delta.id.is_some() {
            call.id = delta.id.clone();
        }
        if delta.name.is_some() {
            call.name = delta.name.clone();
        }
        call.args.push_str(&delta.args);
    }

    if chunk.usage.is_some() {
        partial.usage = chunk.usage;
    }
    partial.done = partial.done || chunk.done;

    partial
}

impl PartialAiMessage {
    /// Whether any tool-call fragment has been observed.
    pub fn has_tool_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    /// Snapshots of the calls under assembly, in index order, for
    /// placeholder rendering while the stream is still running. Arguments
    /// stay `None` until the accumulated fragments parse as complete JSON.
    pub fn call_previews(&self) -> Vec<CallPreview> {
        self.calls
            .iter()
            .map(|(index, call)| CallPreview {
                index: *index,
                name: call.name.clone(),
                args: serde_json::from_str(&call.args).ok(),
            })
            .collect()
    }

    /// Finalize into a timeline message, calls ordered by stream index.
    ///
    /// Empty argument text means a zero-argument call. Malformed argument
    /// JSON is carried through as `null` so schema validation downstream
    /// rejects the call as a tool failure instead of the fold crashing
    /// the turn.
    pub fn into_message(self) -> Message {
        let tool_calls: Vec<ToolCall> = self
            .calls
            .into_values()
            .map(PartialToolCall::finish)
            .collect();
        Message::ai(self.text, tool_calls)
    }
}

impl PartialToolCall {
    fn finish(self) -> ToolCall {
        ToolCall {
            // Some backends omit call ids; synthesize one so the
            // result-pairing invariant still holds.
            id: self
                .id
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple())),
            name: self.name.unwrap_or_default(),
            args: parse_args(&self.args),
        }
    }
}

fn parse_args(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(trimmed).unwrap_or(serde_json::Value::Null)
}
