use super::{GitEngine, relative_arg};
use crate::error::GitError;
use crate::git::parser;
use crate::git::types::Remote;
use log::{error, info, warn};
use std::path::Path;
use std::time::Duration;

const MIN_COMMIT_MESSAGE_LEN: usize = 3;
const AUTO_STASH_MESSAGE: &str = "Auto-stash before branch switch";

impl GitEngine {
    /// Run a mutating command; on success recompute and publish the status of `root`
    async fn mutate(&self, root: &Path, args: &[&str], timeout: Duration, what: &str) -> bool {
        match self.git(root, args, timeout).await {
            Ok(_) => {
                info!("{} succeeded in {}", what, root.display());
                self.refresh(root).await;
                true
            }
            Err(GitError::NotARepository) => {
                warn!("Cannot {}: {} is not a repository", what, root.display());
                false
            }
            Err(e) => {
                error!("Failed to {} in {}: {}", what, root.display(), e);
                false
            }
        }
    }

    /// Refuse caller-supplied refs and names that git would parse as options
    fn refuse_options(what: &str, values: &[&str]) -> bool {
        match values.iter().find(|value| value.starts_with('-')) {
            Some(value) => {
                warn!("Cannot {}: {:?} looks like an option", what, value);
                true
            }
            None => false,
        }
    }

    pub async fn stage_file(&self, root: impl AsRef<Path>, path: impl AsRef<Path>) -> bool {
        let root = root.as_ref();
        let path = relative_arg(root, path.as_ref());
        self.mutate(root, &["add", "--", &path], self.timeout(), "stage file")
            .await
    }

    pub async fn unstage_file(&self, root: impl AsRef<Path>, path: impl AsRef<Path>) -> bool {
        let root = root.as_ref();
        let path = relative_arg(root, path.as_ref());
        self.mutate(
            root,
            &["reset", "-q", "HEAD", "--", &path],
            self.timeout(),
            "unstage file",
        )
        .await
    }

    /// Throw away working-tree changes to a tracked file.
    ///
    /// Untracked files are refused rather than deleted.
    pub async fn discard_changes(&self, root: impl AsRef<Path>, path: impl AsRef<Path>) -> bool {
        let root = root.as_ref();
        let path = relative_arg(root, path.as_ref());

        let tracked = ["ls-files", "--error-unmatch", "--", &path];
        if let Err(e) = self.git(root, &tracked, self.timeout()).await {
            warn!("Not discarding {}: not tracked ({})", path, e);
            return false;
        }

        // `restore` needs git 2.23; older versions only have `checkout --`
        if self
            .git(root, &["restore", "--", &path], self.timeout())
            .await
            .is_ok()
        {
            info!("Discarded changes to {}", path);
            self.refresh(root).await;
            return true;
        }
        self.mutate(
            root,
            &["checkout", "--", &path],
            self.timeout(),
            "discard changes",
        )
        .await
    }

    /// Commit what is staged. The message is trimmed and must be at least three characters.
    pub async fn commit(&self, root: impl AsRef<Path>, message: &str) -> bool {
        let root = root.as_ref();
        let message = message.trim();
        if message.chars().count() < MIN_COMMIT_MESSAGE_LEN {
            warn!(
                "Commit message too short (minimum {} characters)",
                MIN_COMMIT_MESSAGE_LEN
            );
            return false;
        }

        let staged = match self
            .git(root, &["diff", "--cached", "--name-only"], self.timeout())
            .await
        {
            Ok(output) => output.stdout,
            Err(e) => {
                error!("Failed to list staged files in {}: {}", root.display(), e);
                return false;
            }
        };
        if staged.trim().is_empty() {
            warn!("Nothing staged to commit in {}", root.display());
            return false;
        }

        self.mutate(
            root,
            &["commit", "-m", message],
            self.config.git.commit_timeout(),
            "commit",
        )
        .await
    }

    /// Switch branches. Uncommitted changes that conflict make git refuse;
    /// stashing first is up to the caller.
    pub async fn checkout_branch(&self, root: impl AsRef<Path>, name: &str) -> bool {
        if Self::refuse_options("checkout branch", &[name]) {
            return false;
        }
        self.mutate(
            root.as_ref(),
            &["checkout", name],
            self.timeout(),
            "checkout branch",
        )
        .await
    }

    /// Create `name` at HEAD and switch to it
    pub async fn create_branch(&self, root: impl AsRef<Path>, name: &str) -> bool {
        if Self::refuse_options("create branch", &[name]) {
            return false;
        }
        self.mutate(
            root.as_ref(),
            &["checkout", "-b", name],
            self.timeout(),
            "create branch",
        )
        .await
    }

    pub async fn stash(&self, root: impl AsRef<Path>) -> bool {
        self.mutate(
            root.as_ref(),
            &["stash", "push", "-m", AUTO_STASH_MESSAGE],
            self.timeout(),
            "stash changes",
        )
        .await
    }

    pub async fn stash_pop(&self, root: impl AsRef<Path>) -> bool {
        self.mutate(root.as_ref(), &["stash", "pop"], self.timeout(), "pop stash")
            .await
    }

    /// Detach HEAD at `hash`
    pub async fn checkout_commit(&self, root: impl AsRef<Path>, hash: &str) -> bool {
        if Self::refuse_options("checkout commit", &[hash]) {
            return false;
        }
        self.mutate(
            root.as_ref(),
            &["checkout", "--detach", hash],
            self.timeout(),
            "checkout commit",
        )
        .await
    }

    /// Create a branch at `hash` without switching to it; returns the branch name.
    ///
    /// Defaults to `branch-from-<first 7 characters of hash>`.
    pub async fn create_branch_from_commit(
        &self,
        root: impl AsRef<Path>,
        hash: &str,
        name: Option<&str>,
    ) -> Option<String> {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("branch-from-{}", hash.chars().take(7).collect::<String>()),
        };
        if Self::refuse_options("create branch from commit", &[name.as_str(), hash]) {
            return None;
        }

        self.mutate(
            root.as_ref(),
            &["branch", &name, hash],
            self.timeout(),
            "create branch from commit",
        )
        .await
        .then_some(name)
    }

    pub async fn get_remotes(&self, root: impl AsRef<Path>) -> Vec<Remote> {
        self.query(
            root.as_ref(),
            &["remote", "-v"],
            "list remotes",
            parser::parse_remotes,
        )
        .await
        .unwrap_or_default()
    }

    pub async fn add_remote(&self, root: impl AsRef<Path>, name: &str, url: &str) -> bool {
        if Self::refuse_options("add remote", &[name, url]) {
            return false;
        }
        self.mutate(
            root.as_ref(),
            &["remote", "add", name, url],
            self.timeout(),
            "add remote",
        )
        .await
    }

    /// Push `branch` and set it to track `remote`
    pub async fn push_to_remote(&self, root: impl AsRef<Path>, remote: &str, branch: &str) -> bool {
        if Self::refuse_options("push", &[remote, branch]) {
            return false;
        }
        self.mutate(
            root.as_ref(),
            &["push", "-u", remote, branch],
            self.config.git.push_timeout(),
            "push",
        )
        .await
    }

    /// Run `git init` in an existing directory
    pub async fn init_repo(&self, root: impl AsRef<Path>) -> bool {
        let root = root.as_ref();
        if !root.is_dir() {
            warn!("Cannot init {}: not a directory", root.display());
            return false;
        }

        match self.runner.run_checked(&["init"], root, self.timeout()).await {
            Ok(_) => {
                info!("Initialized repository in {}", root.display());
                self.refresh(root).await;
                true
            }
            Err(e) => {
                error!("Failed to init repository in {}: {}", root.display(), e);
                false
            }
        }
    }
}
