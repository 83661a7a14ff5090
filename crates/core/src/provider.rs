//! Provider trait — the abstraction over LLM backends.
//!
//! A provider turns a prepared message list plus bound tool schemas into a
//! chunked async stream of partial assistant output. Concrete wire protocols
//! (OpenAI-compatible SSE, Anthropic Messages API) live in
//! `codeclaw-providers`; the work loop only ever sees [`StreamChunk`]s.

use crate::error::ProviderError;
use crate::message::{Message, ToolCallChunk};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for a provider request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-sonnet-4", "gpt-4o", "magistral:24b")
    pub model: String,

    /// The prepared conversation (system first, then model-input messages)
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    pub tools: Vec<ToolDefinition>,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
///
/// Tool call arguments arrive as raw JSON fragments keyed by call index;
/// the streaming fold in `codeclaw-agent` merges them into complete calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    /// Partial content delta
    pub content: Option<String>,

    /// Partial tool call deltas, merged by index downstream
    pub tool_call_chunks: Vec<ToolCallChunk>,

    /// Whether this is the final chunk
    pub done: bool,

    /// Usage info (typically only near the final chunk)
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// A pure content delta.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    /// The terminal chunk of a stream.
    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

/// The core Provider trait.
///
/// Every LLM backend implements this trait. The work loop calls `stream()`
/// without knowing which provider is being used; aborting a turn is done by
/// dropping the receiver, which tears down the wire read on its next send.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter", "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a stream of response chunks.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    >;
}

impl std::fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider").field("name", &self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("gpt-4o", vec![]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
        assert!(req.tools.is_empty());
    }

    #[test]
    fn provider_request_with_tools() {
        let tool = ToolDefinition {
            name: "listDirectory".into(),
            description: "List directory contents".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "directory": { "type": "string" }
                },
                "required": ["directory"]
            }),
        };
        let req = ProviderRequest::new("gpt-4o", vec![]).with_tools(vec![tool]);
        assert_eq!(req.tools.len(), 1);
        assert_eq!(req.tools[0].name, "listDirectory");
    }

    #[test]
    fn stream_chunk_constructors() {
        let chunk = StreamChunk::content("hel");
        assert_eq!(chunk.content.as_deref(), Some("hel"));
        assert!(!chunk.done);

        let last = StreamChunk::done();
        assert!(last.done);
        assert!(last.content.is_none());
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "executeCommand".into(),
            description: "Run a command in the sandbox".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command to run" }
                },
                "required": ["command"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("executeCommand"));
        assert!(json.contains("command"));
    }
}
