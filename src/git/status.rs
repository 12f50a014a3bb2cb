use crate::error::{GitError, GitResult};
use crate::git::executor::CommandRunner;
use crate::git::parser::{self, StatusEntry};
use crate::git::types::{FileChange, StatusMap};
use log::error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const STATUS_ARGS: [&str; 3] = ["status", "--porcelain=v1", "-uall"];

/// True when `root` has a `.git` entry (directory, or file for worktrees)
pub fn is_repository(root: &Path) -> bool {
    !root.as_os_str().is_empty() && root.join(".git").exists()
}

/// Computes full status snapshots for a repository root.
///
/// Holds no state besides the runner, so clones can be handed to watcher
/// tasks and called concurrently.
#[derive(Clone)]
pub struct StatusComputer {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl StatusComputer {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Status map for `root`, or `None` when it is not a repository or git fails
    pub async fn get_status(&self, root: &Path) -> Option<StatusMap> {
        match self.try_status(root).await {
            Ok(map) => Some(map),
            Err(GitError::NotARepository) => None,
            Err(e) => {
                error!("Failed to get status for {}: {}", root.display(), e);
                None
            }
        }
    }

    /// Flattened change list; empty when `root` is not a repository
    pub async fn get_changes(&self, root: &Path) -> Vec<FileChange> {
        match self.entries(root).await {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| FileChange {
                    path: entry.path,
                    status: entry.status,
                    staged: entry.staged,
                })
                .collect(),
            Err(GitError::NotARepository) => Vec::new(),
            Err(e) => {
                error!("Failed to get changes for {}: {}", root.display(), e);
                Vec::new()
            }
        }
    }

    /// Status map with the failure kept as an error
    pub async fn try_status(&self, root: &Path) -> GitResult<StatusMap> {
        let entries = self.entries(root).await?;
        Ok(entries
            .into_iter()
            .map(|entry| (entry.path, entry.status))
            .collect())
    }

    async fn entries(&self, root: &Path) -> GitResult<Vec<StatusEntry>> {
        if !is_repository(root) {
            return Err(GitError::NotARepository);
        }

        let output = self
            .runner
            .run_checked(&STATUS_ARGS, root, self.timeout)
            .await?;
        Ok(parser::parse_status_porcelain_v1(root, &output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::executor::CommandOutput;
    use crate::git::types::GitStatus;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CannedRunner {
        stdout: String,
        exit_code: i32,
        calls: AtomicUsize,
    }

    impl CannedRunner {
        fn new(stdout: &str, exit_code: i32) -> Arc<Self> {
            Arc::new(Self {
                stdout: stdout.to_string(),
                exit_code,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn run(&self, args: &[&str], _cwd: &Path, _timeout: Duration) -> GitResult<CommandOutput> {
            assert_eq!(args, STATUS_ARGS);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CommandOutput {
                stdout: self.stdout.clone(),
                stderr: String::new(),
                exit_code: self.exit_code,
                success: self.exit_code == 0,
            })
        }
    }

    fn fake_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        temp
    }

    #[tokio::test]
    async fn test_not_a_repository_skips_git() {
        let temp = TempDir::new().unwrap();
        let runner = CannedRunner::new("", 0);
        let computer = StatusComputer::new(runner.clone(), Duration::from_secs(5));

        assert!(computer.get_status(temp.path()).await.is_none());
        assert!(computer.get_changes(temp.path()).await.is_empty());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clean_repository_is_empty_map() {
        let temp = fake_repo();
        let computer = StatusComputer::new(CannedRunner::new("", 0), Duration::from_secs(5));

        let status = computer.get_status(temp.path()).await;
        assert_eq!(status, Some(StatusMap::new()));
    }

    #[tokio::test]
    async fn test_status_map_keys_are_absolute() {
        let temp = fake_repo();
        let computer = StatusComputer::new(
            CannedRunner::new("M  src/a.ts\n?? notes.md\n", 0),
            Duration::from_secs(5),
        );

        let status = computer.get_status(temp.path()).await.unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(
            status.get(&temp.path().join("src").join("a.ts")),
            Some(&GitStatus::Modified)
        );
        assert_eq!(
            status.get(&temp.path().join("notes.md")),
            Some(&GitStatus::Untracked)
        );
        assert!(status.keys().all(|k| k.is_absolute()));
    }

    #[tokio::test]
    async fn test_changes_carry_staged_flag() {
        let temp = fake_repo();
        let computer = StatusComputer::new(
            CannedRunner::new("M  staged.rs\n M unstaged.rs\n", 0),
            Duration::from_secs(5),
        );

        let changes = computer.get_changes(temp.path()).await;
        assert_eq!(changes.len(), 2);
        assert!(changes[0].staged);
        assert_eq!(changes[0].status, GitStatus::Modified);
        assert!(!changes[1].staged);
        assert_eq!(changes[1].status, GitStatus::WdModified);
    }

    #[tokio::test]
    async fn test_git_failure_is_none() {
        let temp = fake_repo();
        let computer = StatusComputer::new(CannedRunner::new("", 128), Duration::from_secs(5));

        assert!(computer.get_status(temp.path()).await.is_none());
        assert!(matches!(
            computer.try_status(temp.path()).await,
            Err(GitError::CommandFailed(_))
        ));
    }
}
