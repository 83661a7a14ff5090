//! Message preparation: project the session timeline into model input.
//!
//! Pure function of the timeline plus per-call options. Bookkeeping entries
//! are dropped, the history is trimmed to the configured limits, the local
//! provider gets tool results folded into plain assistant text, and a fresh
//! system message is prepended.

use crate::token::{estimate_message_tokens, estimate_tokens};
use codeclaw_core::message::Message;

/// Fallback body for a tool result that produced no content.
const EMPTY_TOOL_RESULT: &str = "ERROR: No content returned from tool.";

/// Trimming and transform options for one model call.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Provider tag, selects provider-specific transforms
    pub provider: String,

    /// Hard cap on the number of history messages sent
    pub max_messages: Option<usize>,

    /// Token budget covering the system prompt plus history
    pub context_size: Option<u32>,
}

/// Produce the ordered message list for one model call.
///
/// Both trim passes work from the most recent message backward. The window
/// never drops the most recent human message, even when that exceeds the
/// configured limits, and never starts inside an orphaned run of tool
/// results whose assistant message was cut.
pub fn prepare(messages: &[Message], system_text: &str, options: &PrepareOptions) -> Vec<Message> {
    let mut kept: Vec<&Message> = messages.iter().filter(|m| m.is_model_input()).collect();

    if let Some(max) = options.max_messages {
        let start = kept.len().saturating_sub(max);
        let start = align_window_start(&kept, start);
        kept.drain(..start);
    }

    if let Some(budget) = options.context_size {
        // The system message is always sent; reserve its share first.
        let reserved = 4 + estimate_tokens(system_text);
        let available = (budget as usize).saturating_sub(reserved);
        let start = token_window_start(&kept, available);
        let start = align_window_start(&kept, start);
        kept.drain(..start);
    }

    let fold_tool_results = options.provider == "ollama";
    let mut prepared = Vec::with_capacity(kept.len() + 1);
    prepared.push(Message::system(system_text));
    for msg in kept {
        if fold_tool_results {
            if let Message::ToolResult { name, content, .. } = msg {
                prepared.push(fold_tool_result(name, content));
                continue;
            }
        }
        prepared.push(msg.clone());
    }

    prepared
}

/// Smallest suffix start whose estimated cost still fits the budget.
fn token_window_start(kept: &[&Message], budget: usize) -> usize {
    let mut start = kept.len();
    let mut total = 0;
    while start > 0 {
        let cost = estimate_message_tokens(kept[start - 1]);
        if total + cost > budget {
            break;
        }
        total += cost;
        start -= 1;
    }
    start
}

/// Adjust a trim boundary so the window keeps the most recent human message
/// and does not begin with tool results whose assistant message was cut.
fn align_window_start(kept: &[&Message], mut start: usize) -> usize {
    if let Some(last_human) = kept
        .iter()
        .rposition(|m| matches!(m, Message::Human { .. }))
    {
        if start > last_human {
            start = last_human;
        }
    }
    // Trimming only removes a prefix, so the only split pair possible is a
    // leading run of results; drop the whole pair by skipping past them.
    while start < kept.len() && matches!(kept[start], Message::ToolResult { .. }) {
        start += 1;
    }
    start
}

/// Fold a tool result into plain assistant text for models that mishandle
/// the tool-result role.
fn fold_tool_result(name: &str, content: &str) -> Message {
    let body = if content.is_empty() {
        EMPTY_TOOL_RESULT
    } else {
        content
    };
    Message::ai(format!("Result of tool call {name}:\n\n{body}"), Vec::new())
}
