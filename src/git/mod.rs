pub mod executor;
pub mod parser;
pub mod status;
pub mod types;
pub mod version;

// Re-export commonly used types
pub use executor::{CommandOutput, CommandRunner, DEFAULT_TIMEOUT, GitExecutor};
pub use parser::{StatusEntry, parse_branch_list, parse_log, parse_status_porcelain_v1};
pub use status::{StatusComputer, is_repository};
pub use types::{Branch, Commit, CommitStats, FileChange, FileDiff, GitStatus, Remote, StatusMap};
pub use version::GitVersion;
