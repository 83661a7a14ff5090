//! Delete file tool.

use crate::workdir::resolve_in_work_dir;
use async_trait::async_trait;
use codeclaw_core::tool::{ERROR_PREFIX, Tool, ToolContext, tool_failure_text};

pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "deleteFile"
    }

    fn description(&self) -> &str {
        "Delete a file, relative to the project root."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "fileName": {
                    "type": "string",
                    "description": "The file to delete, relative to the project root."
                }
            },
            "required": ["fileName"]
        })
    }

    fn destructive(&self) -> bool {
        true
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> String {
        let Some(file_name) = args["fileName"].as_str() else {
            return tool_failure_text(self.name(), "missing `fileName` argument");
        };

        let path = match resolve_in_work_dir(&ctx.work_dir, file_name) {
            Ok(p) => p,
            Err(e) => return format!("{ERROR_PREFIX}{e}"),
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => format!("{file_name} deleted."),
            Err(e) => tool_failure_text(self.name(), e),
        }
    }
}
