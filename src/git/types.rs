use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Status of a single file as seen by `git status`.
///
/// Index-side states carry no prefix; `Wd*` states describe changes that
/// exist only in the working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GitStatus {
    Unmodified,
    Added,
    Modified,
    Deleted,
    Renamed,
    Typechange,
    Untracked,
    WdModified,
    WdDeleted,
    WdRenamed,
    WdTypechange,
    Conflicted,
}

impl GitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GitStatus::Unmodified => "unmodified",
            GitStatus::Added => "added",
            GitStatus::Modified => "modified",
            GitStatus::Deleted => "deleted",
            GitStatus::Renamed => "renamed",
            GitStatus::Typechange => "typechange",
            GitStatus::Untracked => "untracked",
            GitStatus::WdModified => "wd-modified",
            GitStatus::WdDeleted => "wd-deleted",
            GitStatus::WdRenamed => "wd-renamed",
            GitStatus::WdTypechange => "wd-typechange",
            GitStatus::Conflicted => "conflicted",
        }
    }
}

impl std::fmt::Display for GitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Absolute file path → status, for every changed file in a repository.
///
/// An empty map is a clean repository. "Not a repository" is expressed as
/// `Option::<StatusMap>::None` by the functions returning it.
pub type StatusMap = BTreeMap<PathBuf, GitStatus>;

/// Flattened view of a status entry for change lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub status: GitStatus,
    pub staged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub current: bool,
    /// Remote name for remote-tracking branches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    /// Parent hashes, first parent first
    pub parent_hashes: Vec<String>,
    pub message: String,
    pub author: String,
    pub date: DateTime<FixedOffset>,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_changes: Option<CommitStats>,
}

/// Per-commit line and file totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    pub additions: usize,
    pub deletions: usize,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub additions: usize,
    pub deletions: usize,
    /// Unified diff text
    pub changes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub url: String,
}
