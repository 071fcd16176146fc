use std::time::Duration;
use thiserror::Error;
use treestate_process::ProcessError;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to start git: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("`git {command}` failed (exit code {}): {stderr}", fmt_code(.code))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`git {command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Rebase failed and was aborted: {stderr}")]
    RebaseConflict { stderr: String },

    #[error("Push rejected: {stderr}")]
    PushRejected { stderr: String },

    #[error("Path escapes the repository: {path}")]
    PathTraversal { path: String },

    #[error("Not a git repository: {0}")]
    NotARepo(String),

    #[error("Git operation failed: {0}")]
    Repository(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string())
}

/// Messages git prints when HEAD does not resolve to a commit yet
const NO_COMMITS_MARKERS: &[&str] = &[
    "does not have any commits yet",
    "unknown revision or path not in the working tree",
    "ambiguous argument 'head'",
    "bad revision 'head'",
    "could not resolve head",
    "bad default revision 'head'",
];

/// Messages git prints when the remote refuses a push that is not a fast-forward
const PUSH_REJECTED_MARKERS: &[&str] = &[
    "non-fast-forward",
    "rejected",
    "fetch first",
    "failed to push some refs",
];

/// Messages git prints when a rebase stops on conflicting changes
const REBASE_CONFLICT_MARKERS: &[&str] = &[
    "conflict",
    "could not apply",
    "resolve all conflicts",
];

impl GitError {
    pub(crate) fn from_process(command: &str, err: ProcessError) -> Self {
        match err {
            ProcessError::SpawnFailed(e) => GitError::SpawnFailed(e),
            ProcessError::Timeout(timeout) => GitError::Timeout {
                command: command.to_string(),
                timeout,
            },
            ProcessError::Io(e) => GitError::Io(e),
        }
    }

    /// Captured stderr, for variants that carry it
    pub fn stderr(&self) -> Option<&str> {
        match self {
            GitError::NonZeroExit { stderr, .. }
            | GitError::RebaseConflict { stderr }
            | GitError::PushRejected { stderr } => Some(stderr),
            _ => None,
        }
    }

    /// The repository has no commits, so HEAD-relative commands cannot run
    pub fn is_no_commits(&self) -> bool {
        match self {
            GitError::NonZeroExit { stderr, .. } => {
                let lower = stderr.to_ascii_lowercase();
                NO_COMMITS_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }

    /// The remote rejected a push because it was not a fast-forward
    pub fn is_push_rejection(&self) -> bool {
        matches!(self, GitError::PushRejected { .. })
    }
}

/// Whether push output reads as a non-fast-forward rejection
pub(crate) fn looks_like_push_rejection(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    PUSH_REJECTED_MARKERS.iter().any(|m| lower.contains(m))
}

/// Whether rebase output reads as a stop on conflicting changes
pub(crate) fn looks_like_rebase_conflict(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    REBASE_CONFLICT_MARKERS.iter().any(|m| lower.contains(m))
}
