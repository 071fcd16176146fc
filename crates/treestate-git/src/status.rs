use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Branch tracking state taken from the `# branch.*` header records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInfo {
    /// Current branch, `None` on a detached HEAD
    pub current: Option<String>,
    /// Upstream branch, e.g. `origin/main`
    pub tracking: Option<String>,
    pub ahead: u32,
    pub behind: u32,
}

/// Kind of change recorded for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    Untracked,
    Conflicted,
}

impl FileChangeStatus {
    /// Map a porcelain index (X) code to a staged status
    pub fn from_index_code(code: char) -> Self {
        match code {
            'A' => FileChangeStatus::Added,
            'D' => FileChangeStatus::Deleted,
            'R' => FileChangeStatus::Renamed,
            'C' => FileChangeStatus::Copied,
            'U' => FileChangeStatus::Conflicted,
            _ => FileChangeStatus::Modified,
        }
    }
}

impl std::fmt::Display for FileChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FileChangeStatus::Modified => "modified",
            FileChangeStatus::Added => "added",
            FileChangeStatus::Deleted => "deleted",
            FileChangeStatus::Renamed => "renamed",
            FileChangeStatus::Copied => "copied",
            FileChangeStatus::Untracked => "untracked",
            FileChangeStatus::Conflicted => "conflicted",
        };
        write!(f, "{}", label)
    }
}

/// One entry of a flat change list. A path may appear twice: once staged
/// (index vs HEAD) and once unstaged (working tree vs index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub path: String,
    pub status: FileChangeStatus,
    pub staged: bool,
    /// Pre-rename path, only for resolved renames/copies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
}

/// Aggregate working-tree status of one repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingTreeStatus {
    pub branch: BranchInfo,
    /// Staged paths with their index status
    pub staged: BTreeMap<String, FileChangeStatus>,
    /// Unstaged modifications
    pub modified: BTreeSet<String>,
    /// Unstaged deletions
    pub deleted: BTreeSet<String>,
    pub untracked: BTreeSet<String>,
    pub conflicted: BTreeSet<String>,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated_limit: Option<usize>,
}

impl WorkingTreeStatus {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.untracked.is_empty()
            && self.conflicted.is_empty()
            && !self.truncated
    }

    /// Sum of the five bucket sizes
    pub fn total_entries(&self) -> usize {
        self.staged.len()
            + self.modified.len()
            + self.deleted.len()
            + self.untracked.len()
            + self.conflicted.len()
    }
}

/// Flat change list for the working-changes view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChanges {
    pub changes: Vec<FileChange>,
    /// Ignored directory prefixes that actually hid at least one path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_dirs: Option<Vec<String>>,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated_limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_status_is_never_clean() {
        let status = WorkingTreeStatus {
            truncated: true,
            truncated_limit: Some(10),
            ..Default::default()
        };
        assert_eq!(status.total_entries(), 0);
        assert!(!status.is_clean());
        assert!(WorkingTreeStatus::default().is_clean());
    }

    #[test]
    fn index_codes_map_to_statuses() {
        assert_eq!(FileChangeStatus::from_index_code('A'), FileChangeStatus::Added);
        assert_eq!(FileChangeStatus::from_index_code('R'), FileChangeStatus::Renamed);
        assert_eq!(FileChangeStatus::from_index_code('U'), FileChangeStatus::Conflicted);
        assert_eq!(FileChangeStatus::from_index_code('T'), FileChangeStatus::Modified);
    }

    #[test]
    fn serializes_camel_case_for_the_ui() {
        let change = FileChange {
            path: "b.rs".to_string(),
            status: FileChangeStatus::Renamed,
            staged: true,
            original_path: Some("a.rs".to_string()),
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["originalPath"], "a.rs");
        assert_eq!(json["status"], "renamed");

        let status = WorkingTreeStatus::default();
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("truncatedLimit").is_none());
        assert_eq!(json["branch"]["ahead"], 0);
    }
}
