//! Flat change list for the working-changes view.

use std::collections::BTreeSet;
use tracing::debug;

use crate::classifier::{classify_xy, PendingRename, Resolved, UnstagedChange};
use crate::collector::{Flow, RecordSink};
use crate::record::{RecordLayout, StatusCode};
use crate::{FileChange, FileChangeStatus, FileChanges};

/// Directories hidden from change lists by default
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "vendor",
    "dist",
    "build",
    ".next",
    "__pycache__",
    ".venv",
];

/// Builds a [`FileChanges`] list from porcelain v2 records.
///
/// Paths whose first segment is an ignored directory are left out and the
/// directory is reported in `skipped_dirs`. Skipped paths do not count
/// against the entry cap.
#[derive(Debug)]
pub struct ChangeListBuilder {
    state: PendingRename,
    layout: RecordLayout,
    changes: Vec<FileChange>,
    ignored_dirs: BTreeSet<String>,
    skipped: BTreeSet<String>,
    max_entries: usize,
    truncated: bool,
}

impl ChangeListBuilder {
    pub fn new<I, S>(max_entries: usize, ignored_dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: PendingRename::Idle,
            layout: RecordLayout::default(),
            changes: Vec::new(),
            ignored_dirs: ignored_dirs
                .into_iter()
                .map(Into::into)
                .map(|d: String| d.trim_matches('/').to_string())
                .filter(|d| !d.is_empty())
                .collect(),
            skipped: BTreeSet::new(),
            max_entries,
            truncated: false,
        }
    }

    /// Records come from newline-delimited output instead of `-z`
    pub fn with_layout(mut self, layout: RecordLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Ignored prefix matching the first segment of `path`, if any
    fn ignored_prefix(&self, path: &str) -> Option<String> {
        let first = path.split('/').next().unwrap_or(path);
        self.ignored_dirs.get(first).cloned()
    }

    fn push(&mut self, change: FileChange) {
        if self.truncated {
            return;
        }
        if self.changes.len() >= self.max_entries {
            self.truncated = true;
            return;
        }
        self.changes.push(change);
        if self.changes.len() >= self.max_entries {
            self.truncated = true;
        }
    }

    /// Returns false when the path was filtered out
    fn admit(&mut self, path: &str) -> bool {
        match self.ignored_prefix(path) {
            Some(prefix) => {
                self.skipped.insert(prefix);
                false
            }
            None => true,
        }
    }

    fn apply_entry(
        &mut self,
        code: StatusCode,
        path: String,
        original: Option<String>,
        unmerged: bool,
    ) {
        if !self.admit(&path) {
            return;
        }
        let outcome = classify_xy(code.x, code.y, unmerged);

        if outcome.conflicted {
            self.push(FileChange {
                path,
                status: FileChangeStatus::Conflicted,
                staged: false,
                original_path: None,
            });
            return;
        }

        if let Some(status) = outcome.staged {
            let original_path = match status {
                FileChangeStatus::Renamed | FileChangeStatus::Copied => original,
                _ => None,
            };
            self.push(FileChange {
                path: path.clone(),
                status,
                staged: true,
                original_path,
            });
        }

        if let Some(unstaged) = outcome.unstaged {
            let status = match unstaged {
                UnstagedChange::Deleted => FileChangeStatus::Deleted,
                UnstagedChange::Modified => FileChangeStatus::Modified,
            };
            self.push(FileChange {
                path,
                status,
                staged: false,
                original_path: None,
            });
        }
    }
}

impl RecordSink for ChangeListBuilder {
    type Output = FileChanges;

    fn accept(&mut self, record: &str) -> Flow {
        if self.truncated {
            return Flow::LimitReached;
        }

        match self.state.advance(record, self.layout) {
            Resolved::Entry {
                code,
                path,
                original,
                unmerged,
            } => self.apply_entry(code, path, original, unmerged),
            Resolved::Untracked(path) => {
                if self.admit(path) {
                    self.push(FileChange {
                        path: path.to_string(),
                        status: FileChangeStatus::Untracked,
                        staged: false,
                        original_path: None,
                    });
                }
            }
            Resolved::Header { .. } | Resolved::Skip => {}
        }

        if self.truncated {
            debug!(limit = self.max_entries, "Change list cap reached");
            Flow::LimitReached
        } else {
            Flow::Continue
        }
    }

    fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn finish(self) -> FileChanges {
        if !self.skipped.is_empty() {
            debug!(skipped = ?self.skipped, "Skipped ignored directories");
        }
        FileChanges {
            changes: self.changes,
            skipped_dirs: (!self.skipped.is_empty()).then(|| self.skipped.into_iter().collect()),
            truncated: self.truncated,
            truncated_limit: self.truncated.then_some(self.max_entries),
        }
    }
}
