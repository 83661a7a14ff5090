//! Built-in tool implementations for CodeClaw.
//!
//! Tools give the model the ability to act on the project: list, read,
//! write, move, and delete files, search file contents, and run commands
//! inside a container sandbox. Every path a tool touches is resolved and
//! verified against the session workDir before use.

pub mod create_directory;
pub mod delete_file;
pub mod execute_command;
pub mod list_directory;
pub mod move_file;
pub mod read_file;
pub mod sandbox;
pub mod search_in_files;
pub mod workdir;
pub mod write_file;

use codeclaw_core::session::ToolMode;
use codeclaw_core::tool::ToolRegistry;

/// Create the registry of built-in tools for a session.
///
/// The tool set is the same for every mode; the mode only decides which
/// variant of `executeCommand` is registered. In read-only sessions the
/// workDir is mounted into the sandbox read-only and the tool counts as
/// safe, so inspection commands keep working without confirmation.
pub fn default_registry(mode: ToolMode) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(list_directory::ListDirectoryTool));
    registry.register(Box::new(read_file::ReadFileTool));
    registry.register(Box::new(write_file::WriteFileTool));
    registry.register(Box::new(delete_file::DeleteFileTool));
    registry.register(Box::new(move_file::MoveFileTool));
    registry.register(Box::new(create_directory::CreateDirectoryTool));
    registry.register(Box::new(search_in_files::SearchInFilesTool));
    registry.register(Box::new(execute_command::ExecuteCommandTool {
        read_write: mode != ToolMode::ReadOnly,
    }));
    registry
}
