//! System prompt assembly.
//!
//! The prompt starts from a base template keyed by provider (small local
//! models get a terser variant), then appends a discovered project-context
//! block and, unless disabled, the first agent-rule file found under the
//! working directory. Discovery is best-effort: every failure degrades to
//! a shorter prompt, never an error.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Agent-rule files recognized under the working directory, in priority
/// order. The first one found wins.
pub const AGENT_RULE_FILES: [&str; 3] = [".cursorrules", "AGENTS.md", "CLAUDE.md"];

/// Manifests probed for the project-context block, in priority order.
const MANIFEST_FILES: [&str; 4] = ["Cargo.toml", "package.json", "pyproject.toml", "go.mod"];

const RULES_MAX_CHARS: usize = 4000;
const MANIFEST_MAX_CHARS: usize = 2000;

const DEFAULT_TEMPLATE: &str = "\
You are CodeClaw, an AI coding assistant operating on a project directory through a fixed set of tools.

When asked to analyze or summarize the project, work stepwise:
1. List the directory contents (listDirectory) to understand the structure.
2. Identify the files that typically describe a project (manifests, READMEs).
3. Read them (readFile) to learn the purpose, dependencies and setup.
4. Combine what you observed into a coherent summary.

General conduct:
- Only state what you can observe from files; do not guess.
- Only mutate files when the user explicitly asks for it.
- Chain multiple tool calls in sequence when a task needs several steps; do not stop after the first call.
- Prefer reading only the relevant portions of large files.
- After changing files, suggest a version-control step (for example a git commit).

All file paths are relative to the project root. Destructive actions may require the user's confirmation. If a tool result starts with ERROR:, read it carefully and adapt instead of repeating the same call.";

const OLLAMA_TEMPLATE: &str = "\
You are CodeClaw, an AI coding assistant operating on a project directory through a fixed set of tools.

When executing tool calls:
- Chain multiple tool calls in sequence when a task needs several steps.
- For a request like \"analyze this project\", call listDirectory, then readFile on the key files, then answer.
- Only pause when you need clarification or the task is complete.

CRITICAL: after a tool call returns, continue with further tool calls if the task is not finished. Do not stop after a single call.";

/// Builds the system prompt for one model call.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    work_dir: PathBuf,
    provider: String,
    include_agent_rules: bool,
}

impl PromptBuilder {
    pub fn new(work_dir: impl Into<PathBuf>, provider: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            provider: provider.into(),
            include_agent_rules: true,
        }
    }

    /// Enable or disable agent-rule file discovery.
    pub fn with_agent_rules(mut self, enabled: bool) -> Self {
        self.include_agent_rules = enabled;
        self
    }

    /// Assemble the prompt text. Deterministic for a given directory state.
    pub fn build(&self) -> String {
        let mut prompt = String::from(base_template(&self.provider));

        if let Some(context) = project_context(&self.work_dir) {
            prompt.push_str("\n\n--- Project Context ---\n");
            prompt.push_str(&context);
        }

        if self.include_agent_rules {
            if let Some(rules) = find_agent_rules(&self.work_dir) {
                prompt.push_str("\n\n--- Project-Specific Instructions ---\n");
                prompt.push_str(&rules);
            }
        }

        prompt
    }
}

/// The base template for a provider tag.
fn base_template(provider: &str) -> &'static str {
    match provider {
        "ollama" => OLLAMA_TEMPLATE,
        _ => DEFAULT_TEMPLATE,
    }
}

/// Top-level listing plus the first recognized manifest, or `None` when the
/// directory reveals nothing.
fn project_context(work_dir: &Path) -> Option<String> {
    let listing = top_level_listing(work_dir);
    let manifest = first_manifest(work_dir);
    if listing.is_empty() && manifest.is_none() {
        return None;
    }

    let mut block = String::new();
    if !listing.is_empty() {
        block.push_str("Top-level entries of the working directory:\n");
        block.push_str(&listing.join("\n"));
    }
    if let Some((name, contents)) = manifest {
        if !block.is_empty() {
            block.push_str("\n\n");
        }
        block.push_str(&format!("Contents of {name}:\n{contents}"));
    }
    Some(block)
}

/// Sorted names of the immediate children of `work_dir`, ignore rules
/// honored, directories marked with a trailing slash.
fn top_level_listing(work_dir: &Path) -> Vec<String> {
    let mut entries: Vec<String> = WalkBuilder::new(work_dir)
        .max_depth(Some(1))
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.depth() == 1)
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().is_some_and(|t| t.is_dir()) {
                format!("{name}/")
            } else {
                name
            }
        })
        .collect();
    entries.sort();
    entries
}

fn first_manifest(work_dir: &Path) -> Option<(&'static str, String)> {
    for name in MANIFEST_FILES {
        if let Ok(contents) = std::fs::read_to_string(work_dir.join(name)) {
            return Some((name, truncate_chars(&contents, MANIFEST_MAX_CHARS)));
        }
    }
    None
}

/// First readable agent-rule file anywhere under `work_dir`, by filename
/// priority and then by path order, truncated.
fn find_agent_rules(work_dir: &Path) -> Option<String> {
    let mut found: Vec<Vec<PathBuf>> = vec![Vec::new(); AGENT_RULE_FILES.len()];

    let walk = WalkBuilder::new(work_dir)
        .hidden(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();
    for entry in walk.filter_map(|e| e.ok()) {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(priority) = AGENT_RULE_FILES.iter().position(|f| *f == name) {
            found[priority].push(entry.into_path());
        }
    }

    for mut paths in found {
        paths.sort();
        for path in paths {
            if let Ok(contents) = std::fs::read_to_string(&path) {
                return Some(truncate_chars(&contents, RULES_MAX_CHARS));
            }
        }
    }
    None
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}
