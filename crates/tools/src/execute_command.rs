//! Execute command tool — run shell commands inside the container sandbox.

use async_trait::async_trait;
use codeclaw_core::tool::{Tool, ToolContext, tool_failure_text};
use tracing::warn;

use crate::sandbox;

/// Runs commands in the sandbox with the workDir mounted at /data.
///
/// In read-only sessions the registry registers this tool with
/// `read_write: false`: the mount becomes `:ro` and the tool reports itself
/// as safe, so it stays available without confirmation.
pub struct ExecuteCommandTool {
    pub read_write: bool,
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "executeCommand"
    }

    fn description(&self) -> &str {
        "Execute a program in an isolated container with the project mounted at /data. \
         Use for running builds, tests, git, or inspection commands like tree and rg."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The program to run, e.g. \"git\" or \"ls\"."
                },
                "args": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Arguments passed to the program."
                }
            },
            "required": ["command"]
        })
    }

    fn destructive(&self) -> bool {
        self.read_write
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> String {
        let Some(command) = args["command"].as_str() else {
            return tool_failure_text(self.name(), "missing `command` argument");
        };
        let command_args: Vec<String> = match args.get("args") {
            Some(serde_json::Value::Array(items)) => {
                let mut collected = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) => collected.push(s.to_string()),
                        None => {
                            return tool_failure_text(
                                self.name(),
                                "`args` must be an array of strings",
                            );
                        }
                    }
                }
                collected
            }
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(_) => return tool_failure_text(self.name(), "`args` must be an array of strings"),
        };

        match sandbox::run_in_sandbox(&ctx.work_dir, self.read_write, command, &command_args).await
        {
            Ok(output) => {
                let result = sandbox::format_output(&output.stdout, &output.stderr);
                match output.status_code {
                    Some(0) if result.is_empty() => {
                        "Command executed successfully with no output.".to_string()
                    }
                    Some(0) => result,
                    code => {
                        let full_cmd = full_command(command, &command_args);
                        let code_text =
                            code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
                        warn!(command = %full_cmd, code = %code_text, "sandboxed command failed");
                        let mut text = format!(
                            "ERROR: Command \"{full_cmd}\" failed with exit code {code_text}."
                        );
                        if !result.is_empty() {
                            text.push_str("\n\n");
                            text.push_str(&result);
                        }
                        text
                    }
                }
            }
            Err(reason) => {
                warn!(command, %reason, "sandbox unavailable");
                format!("ERROR: Tool 'executeCommand' failed unexpectedly: {reason}")
            }
        }
    }
}

fn full_command(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{command} {}", args.join(" "))
    }
}
