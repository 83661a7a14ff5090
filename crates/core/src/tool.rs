//! Tool trait — the abstraction over assistant capabilities.
//!
//! Tools are what let the model act on the project: list, read and write
//! files, search, run sandboxed commands. A tool never returns a structured
//! error across the invocation boundary; every failure is encoded as plain
//! text prefixed with [`ERROR_PREFIX`] so it can flow back to the model as
//! conversational content instead of crashing the turn.

use crate::error::ToolError;
use crate::message::ToolCall;
use crate::provider::ToolDefinition;
use crate::session::ToolMode;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// Sentinel prefix marking a tool result as a failure.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Whether a tool result text encodes a failure.
pub fn is_error_text(text: &str) -> bool {
    text.starts_with(ERROR_PREFIX)
}

/// The conventional failure text for a tool that could not complete.
pub fn tool_failure_text(tool_name: &str, reason: impl std::fmt::Display) -> String {
    format!("ERROR: Tool `{tool_name}` failed with: {reason}")
}

/// Per-invocation context handed to every tool.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The sandbox root all tool paths are confined to
    pub work_dir: PathBuf,
}

impl ToolContext {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

/// The core Tool trait.
///
/// Implementations live in `codeclaw-tools`. `invoke` must not panic and
/// must not return a structured error: validation, I/O and sandbox failures
/// all become `ERROR: `-prefixed result text.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "readFile", "executeCommand").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Whether this tool can mutate the filesystem or run arbitrary code.
    /// Destructive tools are withheld in read-only mode and gated behind
    /// confirmation in confirm mode.
    fn destructive(&self) -> bool {
        false
    }

    /// Execute the tool with schema-validated arguments.
    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> String;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, partitioned into safe and destructive.
///
/// The work loop uses this to:
/// 1. Get the tool definitions matching the session's tool mode
/// 2. Look up and execute tools when the LLM requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Definitions of non-destructive tools only.
    pub fn safe_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .filter(|t| !t.destructive())
            .map(|t| t.to_definition())
            .collect()
    }

    /// The definition set exposed to the model for the given tool mode.
    /// Read-only sessions see the safe partition; confirm and yolo see all.
    pub fn definitions_for(&self, mode: ToolMode) -> Vec<ToolDefinition> {
        match mode {
            ToolMode::ReadOnly => self.safe_definitions(),
            ToolMode::Confirm | ToolMode::Yolo => self.definitions(),
        }
    }

    /// Whether the named tool is destructive. `None` if unknown.
    pub fn is_destructive(&self, name: &str) -> Option<bool> {
        self.tools.get(name).map(|t| t.destructive())
    }

    /// Validate arguments and dispatch a tool call.
    ///
    /// Unknown tools and malformed arguments are registry-level errors; the
    /// caller converts them into failure records. Anything past this seam
    /// comes back as result text, error-prefixed or not.
    pub async fn invoke(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        validate_args(&call.args, &tool.parameters_schema())
            .map_err(ToolError::InvalidArguments)?;

        Ok(tool.invoke(call.args.clone(), ctx).await)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural validation of arguments against a JSON Schema object.
///
/// Checks that args is an object, that every `required` property is present,
/// and that declared primitive types match. Unknown properties pass through
/// so models that add extra fields do not hard-fail.
fn validate_args(args: &serde_json::Value, schema: &serde_json::Value) -> Result<(), String> {
    let obj = args
        .as_object()
        .ok_or_else(|| "arguments must be a JSON object".to_string())?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !obj.contains_key(key) {
                return Err(format!("missing required argument `{key}`"));
            }
        }
    }

    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in obj {
            let Some(expected) = props.get(key).and_then(|p| p.get("type")).and_then(|t| t.as_str())
            else {
                continue;
            };
            let ok = match expected {
                "string" => value.is_string(),
                "number" => value.is_number(),
                "integer" => value.is_i64() || value.is_u64(),
                "boolean" => value.is_boolean(),
                "object" => value.is_object(),
                "array" => value.is_array(),
                _ => true,
            };
            if !ok {
                return Err(format!("argument `{key}` must be of type {expected}"));
            }
        }
    }

    Ok(())
}
