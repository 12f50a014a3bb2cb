use crate::error::{GitError, GitResult};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind};
use std::path::{Path, PathBuf};

/// Git metadata files that must trigger a refresh even though they live
/// under the (otherwise ignored) `.git` directory
const ALWAYS_WATCHED: [&str; 2] = [".git/HEAD", ".git/index"];

const DEFAULT_IGNORES: [&str; 6] = [
    ".git/objects/**",
    ".git/logs/**",
    "**/node_modules",
    "**/node_modules/**",
    "**/.*",
    "**/.*/**",
];

/// Decides which filesystem events under a repository root matter
#[derive(Debug, Clone)]
pub struct EventFilter {
    root: PathBuf,
    ignored: GlobSet,
}

impl EventFilter {
    /// Build a filter with the default exclusions plus `extra_ignores`
    pub fn new<P: AsRef<Path>>(root: P, extra_ignores: &[String]) -> GitResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_IGNORES
            .iter()
            .copied()
            .chain(extra_ignores.iter().map(String::as_str))
        {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| GitError::ParseError(format!("ignore pattern {}: {}", pattern, e)))?;
            builder.add(glob);
        }
        let ignored = builder
            .build()
            .map_err(|e| GitError::ParseError(format!("ignore patterns: {}", e)))?;

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            ignored,
        })
    }

    /// True if `path` should cause a status recompute
    pub fn is_relevant_path(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        let relative = relative_slash_path(relative);
        if ALWAYS_WATCHED.contains(&relative.as_str()) {
            return true;
        }
        !self.ignored.is_match(&relative)
    }

    /// True if `event` should cause a status recompute
    pub fn is_relevant(&self, event: &Event) -> bool {
        match &event.kind {
            // Reads (including our own git invocations) must not loop back into refreshes
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => {}
            EventKind::Access(_) => return false,
            _ => {}
        }

        if event.need_rescan() {
            return true;
        }
        event.paths.iter().any(|path| self.is_relevant_path(path))
    }
}

fn relative_slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
