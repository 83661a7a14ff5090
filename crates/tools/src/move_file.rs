//! Move file tool — rename or relocate a file inside the workDir.

use crate::workdir::resolve_in_work_dir;
use async_trait::async_trait;
use codeclaw_core::tool::{ERROR_PREFIX, Tool, ToolContext, tool_failure_text};

pub struct MoveFileTool;

#[async_trait]
impl Tool for MoveFileTool {
    fn name(&self) -> &str {
        "moveFile"
    }

    fn description(&self) -> &str {
        "Move or rename a file. Both paths are relative to the project root."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sourceFileName": {
                    "type": "string",
                    "description": "The file to move, relative to the project root."
                },
                "destinationFileName": {
                    "type": "string",
                    "description": "The new path for the file, relative to the project root."
                }
            },
            "required": ["sourceFileName", "destinationFileName"]
        })
    }

    fn destructive(&self) -> bool {
        true
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> String {
        let Some(source) = args["sourceFileName"].as_str() else {
            return tool_failure_text(self.name(), "missing `sourceFileName` argument");
        };
        let Some(destination) = args["destinationFileName"].as_str() else {
            return tool_failure_text(self.name(), "missing `destinationFileName` argument");
        };

        let source_path = match resolve_in_work_dir(&ctx.work_dir, source) {
            Ok(p) => p,
            Err(e) => return format!("{ERROR_PREFIX}{e}"),
        };
        let destination_path = match resolve_in_work_dir(&ctx.work_dir, destination) {
            Ok(p) => p,
            Err(e) => return format!("{ERROR_PREFIX}{e}"),
        };

        match tokio::fs::rename(&source_path, &destination_path).await {
            Ok(()) => format!("{source} moved to {destination}."),
            Err(e) => tool_failure_text(self.name(), e),
        }
    }
}
