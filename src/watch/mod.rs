//! Debounced filesystem watching of a single repository root.

pub mod debounce;
pub mod filter;
pub mod gate;
pub mod watcher;

pub use debounce::Debouncer;
pub use filter::EventFilter;
pub use gate::PublishGate;
pub use watcher::RepositoryWatcher;

use std::path::PathBuf;

/// Observable state of the engine's watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Stopped,
    Watching(PathBuf),
}
