//! Write file tool — create or overwrite a file inside the workDir.

use crate::workdir::resolve_in_work_dir;
use async_trait::async_trait;
use codeclaw_core::tool::{ERROR_PREFIX, Tool, ToolContext, tool_failure_text};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "writeFile"
    }

    fn description(&self) -> &str {
        "Create a file or overwrite an existing one with the given content. \
         Parent directories must already exist; use createDirectory first if needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "fileName": {
                    "type": "string",
                    "description": "The file to write, relative to the project root."
                },
                "fileData": {
                    "type": "string",
                    "description": "The full content to write into the file."
                }
            },
            "required": ["fileName", "fileData"]
        })
    }

    fn destructive(&self) -> bool {
        true
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> String {
        let Some(file_name) = args["fileName"].as_str() else {
            return tool_failure_text(self.name(), "missing `fileName` argument");
        };
        let Some(file_data) = args["fileData"].as_str() else {
            return tool_failure_text(self.name(), "missing `fileData` argument");
        };

        let path = match resolve_in_work_dir(&ctx.work_dir, file_name) {
            Ok(p) => p,
            Err(e) => return format!("{ERROR_PREFIX}{e}"),
        };

        match tokio::fs::write(&path, file_data).await {
            Ok(()) => format!("{file_name} created."),
            Err(e) => tool_failure_text(self.name(), e),
        }
    }
}
