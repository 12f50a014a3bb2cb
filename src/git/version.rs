use crate::error::{GitError, GitResult};
use crate::git::executor::CommandRunner;
use std::time::Duration;

/// Minimum required git version
const MIN_GIT_VERSION: (u32, u32) = (2, 20);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GitVersion {
    /// Ask the runner's git for its version
    pub async fn detect(runner: &dyn CommandRunner, timeout: Duration) -> GitResult<Self> {
        let output = runner
            .run_checked(&["--version"], &std::env::temp_dir(), timeout)
            .await?;
        Self::parse(&output.stdout)
    }

    /// Detect and reject versions older than the supported minimum
    pub async fn validate(runner: &dyn CommandRunner, timeout: Duration) -> GitResult<Self> {
        let version = Self::detect(runner, timeout).await?;
        if !version.is_supported() {
            return Err(GitError::GitVersionTooOld(version.to_string()));
        }
        Ok(version)
    }

    /// Parse strings like "git version 2.39.2" or "git version 2.39.2.windows.1"
    pub fn parse(version_str: &str) -> GitResult<Self> {
        let numbers = version_str
            .trim()
            .strip_prefix("git version ")
            .and_then(|rest| rest.split_whitespace().next())
            .ok_or_else(|| {
                GitError::ParseError(format!("Unexpected git version format: {}", version_str))
            })?;

        let mut parts = numbers.split('.');
        let mut component = |name: &str| -> GitResult<Option<u32>> {
            match parts.next() {
                None => Ok(None),
                Some(raw) => raw.parse::<u32>().map(Some).map_err(|_| {
                    GitError::ParseError(format!("Invalid {} version: {}", name, raw))
                }),
            }
        };

        let major = component("major")?
            .ok_or_else(|| GitError::ParseError(format!("Missing version in: {}", numbers)))?;
        let minor = component("minor")?
            .ok_or_else(|| GitError::ParseError(format!("Missing minor version in: {}", numbers)))?;
        // Patch may carry vendor suffixes such as "2-rc1"
        let patch = component("patch").ok().flatten().unwrap_or(0);

        Ok(GitVersion {
            major,
            minor,
            patch,
        })
    }

    pub fn is_supported(&self) -> bool {
        (self.major, self.minor) >= MIN_GIT_VERSION
    }
}

impl std::fmt::Display for GitVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
