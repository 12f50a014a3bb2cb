pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod graph;
pub mod notifier;
pub mod watch;

// Re-export commonly used types for convenience
pub use config::EngineConfig;
pub use engine::GitEngine;
pub use error::{AppError, AppResult, GitError, GitResult};
pub use git::{
    Branch, Commit, CommitStats, FileChange, FileDiff, GitStatus, GitVersion, Remote, StatusMap,
};
pub use graph::CommitPosition;
pub use notifier::{ChangeNotifier, Subscription};
pub use watch::WatchState;
