//! # CodeClaw Core
//!
//! Domain types, traits, and error definitions for the CodeClaw coding
//! assistant. This crate defines the domain model that all other crates
//! implement against; it carries no HTTP, filesystem, or terminal code.
//!
//! ## Design Philosophy
//!
//! Every subsystem seam is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping providers and tools via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, SessionError, ToolError};
pub use message::{Message, ToolCall, ToolCallChunk, ToolProgressStatus, ToolResultStatus};
pub use provider::{Provider, ProviderRequest, StreamChunk, ToolDefinition, Usage};
pub use session::{ProviderOptions, Session, ToolMode};
pub use tool::{ERROR_PREFIX, Tool, ToolContext, ToolRegistry, is_error_text, tool_failure_text};
