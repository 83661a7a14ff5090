//! Search in files tool — regex search across the workDir tree.

use std::path::Path;

use crate::workdir::resolve_in_work_dir;
use async_trait::async_trait;
use codeclaw_core::tool::{ERROR_PREFIX, Tool, ToolContext, tool_failure_text};
use ignore::WalkBuilder;
use regex::RegexBuilder;

/// Matches are capped so a broad pattern cannot flood the conversation.
const MAX_MATCHES: usize = 100;

pub struct SearchInFilesTool;

#[async_trait]
impl Tool for SearchInFilesTool {
    fn name(&self) -> &str {
        "searchInFiles"
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression. Returns matching lines as \
         path:line: text. Respects .gitignore."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The regular expression to search for."
                },
                "glob": {
                    "type": "string",
                    "description": "A glob limiting which files are searched, e.g. \"**/*.rs\" or \"*.md\"."
                },
                "directory": {
                    "type": "string",
                    "description": "The directory to search in, relative to the project root. Defaults to the root."
                },
                "caseSensitive": {
                    "type": "boolean",
                    "description": "Match case exactly. Defaults to false."
                }
            },
            "required": ["pattern", "glob"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> String {
        let Some(pattern) = args["pattern"].as_str() else {
            return tool_failure_text(self.name(), "missing `pattern` argument");
        };
        let Some(glob) = args["glob"].as_str() else {
            return tool_failure_text(self.name(), "missing `glob` argument");
        };
        let directory = args["directory"].as_str().unwrap_or(".");
        let case_sensitive = args["caseSensitive"].as_bool().unwrap_or(false);

        let root = match resolve_in_work_dir(&ctx.work_dir, directory) {
            Ok(p) => p,
            Err(e) => return format!("{ERROR_PREFIX}{e}"),
        };

        let regex = match RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
        {
            Ok(r) => r,
            Err(e) => return tool_failure_text(self.name(), format!("invalid pattern: {e}")),
        };
        let file_glob = match glob::Pattern::new(glob) {
            Ok(g) => g,
            Err(e) => return tool_failure_text(self.name(), format!("invalid glob: {e}")),
        };

        let root_clone = root.clone();
        let result = tokio::task::spawn_blocking(move || {
            search_tree(&root_clone, &regex, &file_glob)
        })
        .await;

        let matches = match result {
            Ok(m) => m,
            Err(e) => return tool_failure_text(self.name(), e),
        };

        if matches.is_empty() {
            return format!("No matches found for pattern \"{pattern}\".");
        }

        let truncated = matches.len() > MAX_MATCHES;
        let mut out = matches
            .into_iter()
            .take(MAX_MATCHES)
            .collect::<Vec<_>>()
            .join("\n");
        if truncated {
            out.push_str(&format!("\n... results truncated to {MAX_MATCHES} matches."));
        }
        out
    }
}

/// Walks the tree under `root`, honoring .gitignore, and collects matching lines.
///
/// The extra match past `MAX_MATCHES` signals truncation to the caller.
fn search_tree(root: &Path, regex: &regex::Regex, file_glob: &glob::Pattern) -> Vec<String> {
    let mut matches = Vec::new();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    for entry in walker.flatten() {
        if matches.len() > MAX_MATCHES {
            break;
        }
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        let glob_target = rel.to_string_lossy();
        let name_only = entry.file_name().to_string_lossy();
        if !file_glob.matches(&glob_target) && !file_glob.matches(&name_only) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        for (line_no, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(format!("{}:{}: {}", glob_target, line_no + 1, line.trim()));
                if matches.len() > MAX_MATCHES {
                    break;
                }
            }
        }
    }
    matches
}
