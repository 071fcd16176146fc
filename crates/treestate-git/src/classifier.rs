//! Status bucket classification for streamed porcelain v2 records.

use tracing::{debug, trace};

use crate::collector::{Flow, RecordSink};
use crate::record::{Record, RecordLayout, StatusCode};
use crate::{BranchInfo, FileChangeStatus, WorkingTreeStatus};

/// Unstaged (working tree vs index) change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnstagedChange {
    Modified,
    Deleted,
}

/// Result of applying the X/Y rule to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XyOutcome {
    pub staged: Option<FileChangeStatus>,
    pub unstaged: Option<UnstagedChange>,
    pub conflicted: bool,
}

fn is_unchanged(code: char) -> bool {
    matches!(code, '.' | '?' | '!')
}

/// The X/Y rule shared by ordinary, unmerged and resolved rename entries.
///
/// `x` is the index status, `y` the working-tree status; `unmerged` is set
/// for type `u` records.
pub fn classify_xy(x: char, y: char, unmerged: bool) -> XyOutcome {
    let staged = (!is_unchanged(x)).then(|| FileChangeStatus::from_index_code(x));

    let unstaged = if y == 'D' {
        Some(UnstagedChange::Deleted)
    } else if !is_unchanged(y) && y != 'U' {
        Some(UnstagedChange::Modified)
    } else {
        None
    };

    XyOutcome {
        staged,
        unstaged,
        conflicted: unmerged || x == 'U' || y == 'U',
    }
}

/// Parser state carried across records
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingRename {
    /// No rename header outstanding
    Idle,
    /// A type `2` header was seen; the next non-empty record completes it.
    /// With `path` set that record is the original path, otherwise it is
    /// the path itself.
    AwaitingPath {
        code: StatusCode,
        path: Option<String>,
    },
}

/// Outcome of feeding one record to the rename state machine
pub(crate) enum Resolved<'a> {
    /// An entry ready for the X/Y rule
    Entry {
        code: StatusCode,
        path: String,
        original: Option<String>,
        unmerged: bool,
    },
    Untracked(&'a str),
    Header { key: &'a str, value: &'a str },
    /// Nothing to do for this record
    Skip,
}

impl PendingRename {
    /// Advance the state machine by one raw record
    pub(crate) fn advance<'a>(&mut self, raw: &'a str, layout: RecordLayout) -> Resolved<'a> {
        if let PendingRename::AwaitingPath { code, path } = self {
            // Awaited records are raw paths and may look like anything.
            if raw.is_empty() {
                return Resolved::Skip;
            }
            let code = *code;
            let resolved = match path.take() {
                Some(path) => Resolved::Entry {
                    code,
                    path,
                    original: Some(raw.to_string()),
                    unmerged: false,
                },
                None => Resolved::Entry {
                    code,
                    path: raw.to_string(),
                    original: None,
                    unmerged: false,
                },
            };
            *self = PendingRename::Idle;
            return resolved;
        }

        match Record::parse_as(raw, layout) {
            Record::Header { key, value } => Resolved::Header { key, value },
            Record::Ordinary { code, path } => Resolved::Entry {
                code,
                path: path.to_string(),
                original: None,
                unmerged: false,
            },
            Record::Unmerged { code, path } => Resolved::Entry {
                code,
                path: path.to_string(),
                original: None,
                unmerged: true,
            },
            Record::Rename {
                code,
                path: Some(path),
                original: Some(original),
            } => Resolved::Entry {
                code,
                path: path.to_string(),
                original: Some(original.to_string()),
                unmerged: false,
            },
            Record::Rename { code, path, .. } => {
                *self = PendingRename::AwaitingPath {
                    code,
                    path: path.map(str::to_string),
                };
                Resolved::Skip
            }
            Record::Untracked(path) => Resolved::Untracked(path),
            Record::Ignored(_) | Record::Empty | Record::Unknown => Resolved::Skip,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, PendingRename::AwaitingPath { .. })
    }
}

/// Apply a `# branch.*` header to the branch info
pub(crate) fn apply_header(branch: &mut BranchInfo, key: &str, value: &str) {
    match key {
        "branch.head" => {
            branch.current = (value != "(detached)" && !value.is_empty()).then(|| value.to_string());
        }
        "branch.upstream" => {
            branch.tracking = (!value.is_empty()).then(|| value.to_string());
        }
        "branch.ab" => {
            for part in value.split_whitespace() {
                if let Some(n) = part.strip_prefix('+') {
                    branch.ahead = n.parse().unwrap_or(0);
                } else if let Some(n) = part.strip_prefix('-') {
                    branch.behind = n.parse().unwrap_or(0);
                }
            }
        }
        _ => {}
    }
}

/// Builds a [`WorkingTreeStatus`] from porcelain v2 records, capped at
/// `max_entries` bucket entries.
#[derive(Debug)]
pub struct StatusClassifier {
    state: PendingRename,
    layout: RecordLayout,
    status: WorkingTreeStatus,
    max_entries: usize,
    entries: usize,
}

impl StatusClassifier {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: PendingRename::Idle,
            layout: RecordLayout::default(),
            status: WorkingTreeStatus::default(),
            max_entries,
            entries: 0,
        }
    }

    /// Records come from newline-delimited output instead of `-z`
    pub fn with_layout(mut self, layout: RecordLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Classify every record of a complete, already split stream
    pub fn classify_all<'a, I>(records: I, max_entries: usize) -> WorkingTreeStatus
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classifier = Self::new(max_entries);
        for record in records {
            if classifier.accept(record) == Flow::LimitReached {
                break;
            }
        }
        classifier.finish()
    }

    /// Reserve room for one more entry; marks truncation when the cap is hit
    fn has_room(&mut self) -> bool {
        if self.status.truncated {
            return false;
        }
        if self.entries >= self.max_entries {
            self.status.truncated = true;
            return false;
        }
        true
    }

    fn counted(&mut self, inserted: bool) {
        if inserted {
            self.entries += 1;
            if self.entries >= self.max_entries {
                self.status.truncated = true;
            }
        }
    }

    fn apply_entry(&mut self, code: StatusCode, path: String, unmerged: bool) {
        let outcome = classify_xy(code.x, code.y, unmerged);

        if let Some(staged) = outcome.staged {
            if !self.has_room() {
                return;
            }
            let inserted = self.status.staged.insert(path.clone(), staged).is_none();
            self.counted(inserted);
        }

        if let Some(unstaged) = outcome.unstaged {
            if !self.has_room() {
                return;
            }
            let bucket = match unstaged {
                UnstagedChange::Deleted => &mut self.status.deleted,
                UnstagedChange::Modified => &mut self.status.modified,
            };
            let inserted = bucket.insert(path.clone());
            self.counted(inserted);
        }

        if outcome.conflicted {
            if !self.has_room() {
                return;
            }
            let inserted = self.status.conflicted.insert(path);
            self.counted(inserted);
        }
    }
}

impl RecordSink for StatusClassifier {
    type Output = WorkingTreeStatus;

    fn accept(&mut self, record: &str) -> Flow {
        if self.status.truncated {
            return Flow::LimitReached;
        }

        match self.state.advance(record, self.layout) {
            Resolved::Header { key, value } => apply_header(&mut self.status.branch, key, value),
            Resolved::Entry {
                code,
                path,
                unmerged,
                ..
            } => self.apply_entry(code, path, unmerged),
            Resolved::Untracked(path) => {
                if self.has_room() {
                    let inserted = self.status.untracked.insert(path.to_string());
                    self.counted(inserted);
                }
            }
            Resolved::Skip => {}
        }

        if self.status.truncated {
            debug!(limit = self.max_entries, "Status entry cap reached");
            Flow::LimitReached
        } else {
            Flow::Continue
        }
    }

    fn mark_truncated(&mut self) {
        self.status.truncated = true;
    }

    fn is_truncated(&self) -> bool {
        self.status.truncated
    }

    fn finish(mut self) -> WorkingTreeStatus {
        if self.state.is_pending() {
            trace!("Dropping rename entry without its path record");
        }
        if self.status.truncated {
            self.status.truncated_limit = Some(self.max_entries);
        }
        self.status
    }
}
