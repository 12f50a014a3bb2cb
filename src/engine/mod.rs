//! The engine session: queries, watcher control and subscriptions.
//!
//! Every public method is total. Failures are logged and surface as
//! `None`, `false` or an empty collection.

mod operations;

use crate::config::EngineConfig;
use crate::error::{GitError, GitResult};
use crate::git::executor::{CommandOutput, CommandRunner, GitExecutor};
use crate::git::parser::{self, BRANCH_FORMAT, LOG_FORMAT};
use crate::git::status::{StatusComputer, is_repository};
use crate::git::types::{Branch, Commit, CommitStats, FileChange, FileDiff, StatusMap};
use crate::git::version::GitVersion;
use crate::graph::{self, CommitPosition};
use crate::notifier::{ChangeNotifier, Subscription};
use crate::watch::gate::PublishGate;
use crate::watch::watcher::{RepositoryWatcher, WatchContext};
use crate::watch::WatchState;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

pub struct GitEngine {
    config: EngineConfig,
    runner: Arc<dyn CommandRunner>,
    status: StatusComputer,
    notifier: ChangeNotifier,
    gate: Arc<PublishGate>,
    watcher: Mutex<Option<RepositoryWatcher>>,
}

impl GitEngine {
    /// Create an engine that spawns the configured git binary
    pub fn new(config: EngineConfig) -> Self {
        let runner = Arc::new(GitExecutor::new(&config.git.binary));
        Self::with_runner(config, runner)
    }

    /// Create an engine over an arbitrary command runner
    pub fn with_runner(config: EngineConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let status = StatusComputer::new(runner.clone(), config.git.timeout());
        Self {
            config,
            runner,
            status,
            notifier: ChangeNotifier::new(),
            gate: Arc::new(PublishGate::new()),
            watcher: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        self.config.git.timeout()
    }

    fn lock_watcher(&self) -> MutexGuard<'_, Option<RepositoryWatcher>> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a git command in `root`, refusing anything that is not a repository
    async fn git(&self, root: &Path, args: &[&str], timeout: Duration) -> GitResult<CommandOutput> {
        if !is_repository(root) {
            return Err(GitError::NotARepository);
        }
        self.runner.run_checked(args, root, timeout).await
    }

    /// Run a read-only command and parse its stdout; `None` on any failure
    async fn query<T>(
        &self,
        root: &Path,
        args: &[&str],
        what: &str,
        parse: impl FnOnce(&str) -> T,
    ) -> Option<T> {
        match self.git(root, args, self.timeout()).await {
            Ok(output) => Some(parse(&output.stdout)),
            Err(GitError::NotARepository) => {
                debug!("Cannot {}: {} is not a repository", what, root.display());
                None
            }
            Err(e) => {
                warn!("Failed to {} in {}: {}", what, root.display(), e);
                None
            }
        }
    }

    // ---- status ----

    pub async fn get_status(&self, root: impl AsRef<Path>) -> Option<StatusMap> {
        self.status.get_status(&canonical_root(root.as_ref())).await
    }

    pub async fn get_changes(&self, root: impl AsRef<Path>) -> Vec<FileChange> {
        self.status.get_changes(&canonical_root(root.as_ref())).await
    }

    /// Recompute the status of `root` and hand it to subscribers.
    ///
    /// When `root` is the watched root the publication goes through the
    /// watcher's gate, so the cached last-known status stays in sync.
    async fn refresh(&self, root: &Path) {
        let root = canonical_root(root);
        let status = self.status.get_status(&root).await;

        let generation = self
            .lock_watcher()
            .as_ref()
            .filter(|watcher| watcher.root() == root.as_path())
            .map(RepositoryWatcher::generation);

        match generation {
            Some(generation) => {
                if !self.gate.publish(generation, status, &self.notifier) {
                    debug!("Watcher for {} stopped during refresh", root.display());
                }
            }
            None => self.notifier.publish(status.as_ref()),
        }
    }

    // ---- watcher ----

    /// Watch `root`, replacing any watcher already running.
    ///
    /// The current status is published immediately. A root that is not a
    /// repository publishes `None` and leaves the engine stopped.
    pub async fn start_watcher(&self, root: impl AsRef<Path>) {
        let root = canonical_root(root.as_ref());
        self.stop_watcher();
        let generation = self.gate.advance();

        if !is_repository(&root) {
            info!("{} is not a repository; watcher stays stopped", root.display());
            self.gate.publish(generation, None, &self.notifier);
            self.gate.retire(generation);
            return;
        }

        // Subscribe before the initial snapshot so no write in between is missed
        let ctx = WatchContext {
            root: root.clone(),
            generation,
            gate: self.gate.clone(),
            status: self.status.clone(),
            notifier: self.notifier.clone(),
        };
        let watcher = RepositoryWatcher::start(ctx, &self.config.watcher);

        let status = self.status.get_status(&root).await;
        if !self.gate.publish(generation, status, &self.notifier) {
            debug!("start_watcher({}) superseded", root.display());
            return;
        }

        let watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                error!("Failed to watch {}: {}", root.display(), e);
                self.gate.retire(generation);
                return;
            }
        };

        let mut slot = self.lock_watcher();
        if self.gate.is_current(generation) {
            *slot = Some(watcher);
        } else {
            debug!("start_watcher({}) superseded", root.display());
        }
    }

    /// Stop watching. Nothing computed by the old watcher is published after this returns.
    pub fn stop_watcher(&self) {
        let previous = self.lock_watcher().take();
        drop(previous);
        // Also invalidates a start_watcher that has not installed its watcher yet
        self.gate.advance();
    }

    pub fn watched_root(&self) -> Option<PathBuf> {
        self.lock_watcher()
            .as_ref()
            .map(|watcher| watcher.root().to_path_buf())
    }

    pub fn watch_state(&self) -> WatchState {
        match self.watched_root() {
            Some(root) => WatchState::Watching(root),
            None => WatchState::Stopped,
        }
    }

    /// Last status published for the watched root
    pub fn last_known_status(&self) -> Option<StatusMap> {
        self.gate.last_status()
    }

    // ---- subscriptions ----

    /// Register a status listener.
    ///
    /// Callbacks may read `last_known_status` and run queries, but they run
    /// while a publication is in progress and must not call
    /// `start_watcher`/`stop_watcher` synchronously.
    pub fn on_status_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&StatusMap>) + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    pub fn status_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<Option<StatusMap>>) {
        self.notifier.subscribe_channel()
    }

    // ---- history ----

    pub async fn get_branches(&self, root: impl AsRef<Path>) -> Vec<Branch> {
        self.query(
            root.as_ref(),
            &["branch", "-a", BRANCH_FORMAT],
            "list branches",
            parser::parse_branch_list,
        )
        .await
        .unwrap_or_default()
    }

    /// Current branch name; `None` on a detached HEAD or outside a repository
    pub async fn get_current_branch(&self, root: impl AsRef<Path>) -> Option<String> {
        let root = root.as_ref();
        if !is_repository(root) {
            return None;
        }

        // Exits 1 without output on a detached HEAD
        let args = ["symbolic-ref", "--quiet", "--short", "HEAD"];
        match self.runner.run(&args, root, self.timeout()).await {
            Ok(output) if output.success => {
                let name = output.stdout.trim();
                (!name.is_empty()).then(|| name.to_string())
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to read current branch in {}: {}", root.display(), e);
                None
            }
        }
    }

    /// One page of history across all refs, newest first
    pub async fn get_commits(&self, root: impl AsRef<Path>, limit: usize, skip: usize) -> Vec<Commit> {
        let max_count = format!("--max-count={}", limit);
        let skip = format!("--skip={}", skip);
        // --date-order keeps every parent after all of its children
        let args = [
            "log",
            "--all",
            "--date-order",
            max_count.as_str(),
            skip.as_str(),
            "--date=iso-strict",
            LOG_FORMAT,
        ];

        self.query(root.as_ref(), &args, "read history", parser::parse_log)
            .await
            .unwrap_or_default()
    }

    pub async fn get_commit_details(&self, root: impl AsRef<Path>, hash: &str) -> Option<CommitStats> {
        self.query(
            root.as_ref(),
            &["show", "--numstat", "--format=", hash],
            "read commit details",
            parser::parse_numstat,
        )
        .await
        .flatten()
    }

    /// Full `git show` text of a commit with its stat summary
    pub async fn get_commit_diff(&self, root: impl AsRef<Path>, hash: &str) -> Option<String> {
        self.query(
            root.as_ref(),
            &["show", hash, "--pretty=fuller", "--stat"],
            "show commit",
            str::to_string,
        )
        .await
    }

    /// Diff of one file against the index (or HEAD when `staged`).
    ///
    /// An untracked file has no unstaged diff; its contents are presented
    /// as a new-file diff instead.
    pub async fn get_diff(&self, root: impl AsRef<Path>, path: impl AsRef<Path>, staged: bool) -> Option<FileDiff> {
        let root = root.as_ref();
        let relative = relative_arg(root, path.as_ref());

        let mut args = vec!["diff"];
        if staged {
            args.push("--cached");
        }
        args.extend(["--", relative.as_str()]);

        let diff = self.query(root, &args, "read diff", str::to_string).await?;
        if diff.trim().is_empty() && !staged {
            match tokio::fs::read_to_string(root.join(&relative)).await {
                Ok(content) => return Some(parser::synthesize_new_file_diff(&relative, &content)),
                Err(e) => debug!("No diff and unreadable file {}: {}", relative, e),
            }
        }

        let (additions, deletions) = parser::count_diff_lines(&diff);
        Some(FileDiff {
            additions,
            deletions,
            changes: diff,
        })
    }

    /// Version of the configured git binary
    pub async fn git_version(&self) -> Option<GitVersion> {
        match GitVersion::detect(self.runner.as_ref(), self.timeout()).await {
            Ok(version) => Some(version),
            Err(e) => {
                warn!("Failed to detect git version: {}", e);
                None
            }
        }
    }

    /// Column layout for a newest-first page of commits
    pub fn layout_commit_graph(commits: &[Commit]) -> HashMap<String, CommitPosition> {
        graph::layout(commits)
    }
}

/// Resolve symlinks and `..` so one file always gets one status key.
///
/// Falls back to the path as given when it cannot be resolved.
fn canonical_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

/// Path argument for git: relative to `root` when `path` lies under it
fn relative_arg(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).ok().map(Path::to_path_buf).or_else(|| {
        // Keys from get_status are canonical; the caller's root may not be
        let canonical = canonical_root(root);
        path.strip_prefix(canonical).ok().map(Path::to_path_buf)
    });
    match relative {
        Some(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        None => path.to_string_lossy().into_owned(),
    }
}
