//! Read file tool — return the contents of a file inside the workDir.

use crate::workdir::resolve_in_work_dir;
use async_trait::async_trait;
use codeclaw_core::tool::{ERROR_PREFIX, Tool, ToolContext, tool_failure_text};

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "readFile"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file, relative to the project root."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "fileName": {
                    "type": "string",
                    "description": "The file to read, relative to the project root."
                },
                "maxLength": {
                    "type": "integer",
                    "description": "Optional maximum number of characters to return."
                }
            },
            "required": ["fileName"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> String {
        let Some(file_name) = args["fileName"].as_str() else {
            return tool_failure_text(self.name(), "missing `fileName` argument");
        };
        let max_length = args["maxLength"].as_u64().map(|n| n as usize);

        let path = match resolve_in_work_dir(&ctx.work_dir, file_name) {
            Ok(p) => p,
            Err(e) => return format!("{ERROR_PREFIX}{e}"),
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return tool_failure_text(self.name(), e),
        };

        if content.is_empty() {
            return format!("The file \"{file_name}\" is empty.");
        }

        match max_length {
            Some(limit) if content.chars().count() > limit => {
                content.chars().take(limit).collect()
            }
            _ => content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reads_file_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "# Notes\nline two\n").unwrap();

        let tool = ReadFileTool;
        let ctx = ToolContext::new(dir.path());
        let result = tool.invoke(json!({"fileName": "notes.md"}), &ctx).await;

        assert_eq!(result, "# Notes\nline two\n");
    }

    #[tokio::test]
    async fn truncates_to_max_length() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("long.txt"), "abcdefghij").unwrap();

        let tool = ReadFileTool;
        let ctx = ToolContext::new(dir.path());
        let result = tool
            .invoke(json!({"fileName": "long.txt", "maxLength": 4}), &ctx)
            .await;

        assert_eq!(result, "abcd");
    }

    #[tokio::test]
    async fn empty_file_message() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();

        let tool = ReadFileTool;
        let ctx = ToolContext::new(dir.path());
        let result = tool.invoke(json!({"fileName": "empty.txt"}), &ctx).await;

        assert_eq!(result, "The file \"empty.txt\" is empty.");
    }

    #[tokio::test]
    async fn escape_attempt_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool;
        let ctx = ToolContext::new(dir.path());
        let result = tool
            .invoke(json!({"fileName": "../../etc/passwd"}), &ctx)
            .await;

        assert_eq!(result, "ERROR: Access outside of workDir is not allowed.");
    }

    #[tokio::test]
    async fn missing_file_is_an_error_text() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool;
        let ctx = ToolContext::new(dir.path());
        let result = tool.invoke(json!({"fileName": "absent.txt"}), &ctx).await;

        assert!(result.starts_with("ERROR: Tool `readFile` failed with:"));
    }
}
