//! File-backed session store — one JSON document per session.
//!
//! Storage location: `~/.codeclaw/sessions/<id>.json`
//!
//! Saves go through a sibling temp file plus rename, so an interrupted
//! write never leaves a truncated session on disk. Loads tolerate
//! individual messages that no longer parse (format drift, manual edits)
//! by dropping them with a warning instead of refusing the whole session.

use codeclaw_core::error::SessionError;
use codeclaw_core::message::Message;
use codeclaw_core::session::{ProviderOptions, Session, ToolMode};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Mirrors [`Session`] on disk but defers message parsing, so one bad
/// entry does not take the rest of the session down with it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionEnvelope {
    id: String,
    work_dir: PathBuf,
    tool_mode: ToolMode,
    #[serde(rename = "chatServiceOptions")]
    provider_options: ProviderOptions,
    #[serde(default)]
    messages: Vec<serde_json::Value>,
    #[serde(default)]
    finished: usize,
}

/// A directory listing entry, parsed from the envelope only.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub work_dir: PathBuf,
    pub provider: String,
    pub model: String,
    pub messages: usize,
}

/// Narrows [`SessionStore::list`]. Empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub work_dir: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub limit: Option<usize>,
}

/// A session store rooted at a directory.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the default location under the user's home.
    pub fn open_default() -> Self {
        Self::new(Self::default_root())
    }

    /// Default root: `~/.codeclaw/sessions`
    pub fn default_root() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".codeclaw").join("sessions")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Persist a session. Sessions that never accumulated a message are
    /// skipped, so opening the REPL and immediately leaving writes nothing.
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        if session.messages.is_empty() {
            debug!(session_id = %session.id, "Skipping save of empty session");
            return Ok(());
        }

        std::fs::create_dir_all(&self.root).map_err(|e| SessionError::Io {
            path: self.root.display().to_string(),
            reason: e.to_string(),
        })?;

        let json = serde_json::to_string_pretty(session)
            .map_err(|e| SessionError::Serialize(e.to_string()))?;

        let path = self.session_path(&session.id);
        let tmp = self.root.join(format!(".{}.json.tmp", session.id));
        std::fs::write(&tmp, json).map_err(|e| SessionError::Io {
            path: tmp.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| SessionError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(session_id = %session.id, path = %path.display(), "Session saved");
        Ok(())
    }

    /// Load a session by id, dropping messages that fail to parse.
    pub fn load(&self, id: &str) -> Result<Session, SessionError> {
        let path = self.session_path(id);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SessionError::NotFound(id.to_string())
            } else {
                SessionError::Io {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let envelope: SessionEnvelope =
            serde_json::from_str(&raw).map_err(|e| SessionError::Serialize(e.to_string()))?;

        let mut messages = Vec::with_capacity(envelope.messages.len());
        let mut skipped = 0usize;
        for value in envelope.messages {
            match serde_json::from_value::<Message>(value) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    skipped += 1;
                    warn!(session_id = %envelope.id, error = %e, "Skipping unreadable session message");
                }
            }
        }
        if skipped > 0 {
            warn!(session_id = %envelope.id, skipped, "Session loaded with messages dropped");
        }

        // Dropped entries can leave the finished marker past the end.
        let finished = envelope.finished.min(messages.len());

        debug!(session_id = %envelope.id, messages = messages.len(), "Session loaded");
        Ok(Session {
            id: envelope.id,
            work_dir: envelope.work_dir,
            tool_mode: envelope.tool_mode,
            provider_options: envelope.provider_options,
            messages,
            finished,
        })
    }

    /// Stored sessions matching the filter, newest first.
    ///
    /// UUIDv7 ids are time-ordered, so sorting the ids descending sorts
    /// the sessions by creation time. Files that fail to parse are skipped
    /// with a warning.
    pub fn list(&self, filter: &SessionFilter) -> Vec<SessionSummary> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut summaries: Vec<SessionSummary> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.ends_with(".json") && !name.starts_with('.')
            })
            .filter_map(|entry| {
                let raw = std::fs::read_to_string(entry.path()).ok()?;
                match serde_json::from_str::<SessionEnvelope>(&raw) {
                    Ok(envelope) => Some(SessionSummary {
                        id: envelope.id,
                        work_dir: envelope.work_dir,
                        provider: envelope.provider_options.provider,
                        model: envelope.provider_options.model,
                        messages: envelope.messages.len(),
                    }),
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "Skipping unreadable session file");
                        None
                    }
                }
            })
            .filter(|summary| {
                filter
                    .work_dir
                    .as_ref()
                    .is_none_or(|dir| &summary.work_dir == dir)
                    && filter
                        .provider
                        .as_ref()
                        .is_none_or(|p| &summary.provider == p)
                    && filter.model.as_ref().is_none_or(|m| &summary.model == m)
            })
            .collect();

        summaries.sort_by(|a, b| b.id.cmp(&a.id));
        if let Some(limit) = filter.limit {
            summaries.truncate(limit);
        }
        summaries
    }

    /// The most recent session recorded for a working directory.
    pub fn find_latest(&self, work_dir: &Path) -> Option<String> {
        let filter = SessionFilter {
            work_dir: Some(work_dir.to_path_buf()),
            limit: Some(1),
            ..SessionFilter::default()
        };
        self.list(&filter).into_iter().next().map(|s| s.id)
    }

    /// Remove one session. Returns whether a file was actually deleted.
    pub fn delete(&self, id: &str) -> Result<bool, SessionError> {
        let path = self.session_path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Remove every stored session, including stray temp files.
    pub fn clear(&self) -> Result<usize, SessionError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(SessionError::Io {
                    path: self.root.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let mut removed = 0;
        for entry in entries.filter_map(|entry| entry.ok()) {
            let name = entry.file_name();
            let name = name.to_string_lossy().to_string();
            let is_session = name.ends_with(".json") && !name.starts_with('.');
            if !is_session && !name.ends_with(".json.tmp") {
                continue;
            }
            if std::fs::remove_file(entry.path()).is_ok() && is_session {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
