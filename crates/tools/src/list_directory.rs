//! List directory tool — enumerate entries inside the workDir.

use crate::workdir::resolve_in_work_dir;
use async_trait::async_trait;
use codeclaw_core::tool::{ERROR_PREFIX, Tool, ToolContext, tool_failure_text};

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "listDirectory"
    }

    fn description(&self) -> &str {
        "List the files and directories inside a directory, relative to the project root."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "The directory to list, relative to the project root. Use \".\" for the root itself."
                }
            },
            "required": ["directory"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> String {
        let Some(directory) = args["directory"].as_str() else {
            return tool_failure_text(self.name(), "missing `directory` argument");
        };

        let path = match resolve_in_work_dir(&ctx.work_dir, directory) {
            Ok(p) => p,
            Err(e) => return format!("{ERROR_PREFIX}{e}"),
        };

        let mut read_dir = match tokio::fs::read_dir(&path).await {
            Ok(rd) => rd,
            Err(e) => return tool_failure_text(self.name(), e),
        };

        let mut entries: Vec<String> = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().to_string();
                    match entry.metadata().await {
                        Ok(meta) if meta.is_dir() => entries.push(format!("[DIR]  {name}")),
                        Ok(meta) => entries.push(format!("[FILE] {name} ({} bytes)", meta.len())),
                        Err(e) => return tool_failure_text(self.name(), e),
                    }
                }
                Ok(None) => break,
                Err(e) => return tool_failure_text(self.name(), e),
            }
        }

        if entries.is_empty() {
            return format!("The directory {directory} is empty.");
        }

        entries.sort();
        entries.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_definition() {
        let tool = ListDirectoryTool;
        assert_eq!(tool.name(), "listDirectory");
        assert!(!tool.destructive());
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], json!(["directory"]));
    }

    #[tokio::test]
    async fn lists_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        let tool = ListDirectoryTool;
        let ctx = ToolContext::new(dir.path());
        let result = tool.invoke(json!({"directory": "."}), &ctx).await;

        assert!(result.contains("[FILE] a.txt (5 bytes)"));
        assert!(result.contains("[DIR]  src"));
    }

    #[tokio::test]
    async fn empty_directory_message() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let tool = ListDirectoryTool;
        let ctx = ToolContext::new(dir.path());
        let result = tool.invoke(json!({"directory": "empty"}), &ctx).await;

        assert_eq!(result, "The directory empty is empty.");
    }

    #[tokio::test]
    async fn escape_attempt_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListDirectoryTool;
        let ctx = ToolContext::new(dir.path());
        let result = tool.invoke(json!({"directory": "../.."}), &ctx).await;

        assert_eq!(result, "ERROR: Access outside of workDir is not allowed.");
    }

    #[tokio::test]
    async fn missing_directory_is_an_error_text() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListDirectoryTool;
        let ctx = ToolContext::new(dir.path());
        let result = tool.invoke(json!({"directory": "nope"}), &ctx).await;

        assert!(result.starts_with("ERROR: Tool `listDirectory` failed with:"));
    }
}
