//! Path confinement — the security boundary every filesystem tool goes
//! through.
//!
//! User-supplied paths are resolved against the session's workDir and
//! rejected when they escape it, whether by `..` traversal, absolute-path
//! redirection, or a symlinked ancestor. The check runs on every call;
//! nothing about it is cached.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkDirError {
    #[error("Access outside of workDir is not allowed.")]
    OutsideWorkDir,

    #[error("Configuration error! No base path (workDir) available.")]
    NoBasePath,
}

/// Resolve `user_path` inside `work_dir`, rejecting any escape.
///
/// The returned path is lexically normalized but not required to exist, so
/// tools that create files can use it directly. The deepest existing
/// ancestor is canonicalized to catch symlinks pointing outside the root.
pub fn resolve_in_work_dir(work_dir: &Path, user_path: &str) -> Result<PathBuf, WorkDirError> {
    let root = std::fs::canonicalize(work_dir).map_err(|_| WorkDirError::NoBasePath)?;

    let raw = Path::new(user_path);
    let candidate = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        root.join(raw)
    };

    let normalized = normalize(&candidate);
    if !normalized.starts_with(&root) {
        return Err(WorkDirError::OutsideWorkDir);
    }

    // A symlink under the root could still point elsewhere; verify the
    // closest existing ancestor resolves back inside.
    let existing = deepest_existing(&normalized);
    let resolved = std::fs::canonicalize(&existing).map_err(|_| WorkDirError::OutsideWorkDir)?;
    if !resolved.starts_with(&root) {
        return Err(WorkDirError::OutsideWorkDir);
    }

    Ok(normalized)
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other),
        }
    }
    result
}

/// Walk up until a path that exists on disk is found.
fn deepest_existing(path: &Path) -> PathBuf {
    let mut current = path.to_path_buf();
    while !current.exists() {
        if !current.pop() {
            break;
        }
    }
    current
}
