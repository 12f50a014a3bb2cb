use crate::error::{GitError, GitResult};
use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Default time budget for a single git invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Result of executing a git command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
}

impl CommandOutput {
    /// Convert a non-zero exit into `GitError::CommandFailed`
    pub fn into_checked(self, args: &[&str]) -> GitResult<Self> {
        if self.success {
            return Ok(self);
        }
        Err(GitError::CommandFailed(format!(
            "Command 'git {}' failed with exit code {}: {}",
            args.join(" "),
            self.exit_code,
            self.stderr.trim()
        )))
    }
}

/// Runs git with an argument vector in a working directory.
///
/// A non-zero exit is reported through `CommandOutput`, not as an error.
/// Errors are reserved for spawn failures, I/O failures and timeouts.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[&str], cwd: &Path, timeout: Duration) -> GitResult<CommandOutput>;

    /// Run and turn a non-zero exit into an error
    async fn run_checked(
        &self,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> GitResult<CommandOutput> {
        self.run(args, cwd, timeout).await?.into_checked(args)
    }
}

/// Spawns the real `git` binary
#[derive(Debug, Clone)]
pub struct GitExecutor {
    binary: PathBuf,
}

impl Default for GitExecutor {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitExecutor {
    /// Create an executor for the given git binary (name or path)
    pub fn new<P: AsRef<Path>>(binary: P) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
        }
    }

    /// Get the git binary this executor spawns
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, args: &[&str], cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_OPTIONAL_LOCKS", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CommandRunner for GitExecutor {
    async fn run(&self, args: &[&str], cwd: &Path, timeout: Duration) -> GitResult<CommandOutput> {
        debug!("$ git {} [{}]", args.join(" "), cwd.display());

        let mut child = self
            .command(args, cwd)
            .spawn()
            .map_err(|e| GitError::SpawnFailed(format!("{}: {}", self.binary.display(), e)))?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let finished = tokio::time::timeout(timeout, async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let (status, _, _) = tokio::try_join!(
                child.wait(),
                read_pipe(stdout_pipe.as_mut(), &mut stdout),
                read_pipe(stderr_pipe.as_mut(), &mut stderr),
            )?;
            Ok::<(ExitStatus, Vec<u8>, Vec<u8>), std::io::Error>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(result) => result?,
            Err(_) => {
                // kill() also waits, so the child is reaped before we return
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out git process: {}", e);
                }
                warn!("git {} timed out after {:?}", args.join(" "), timeout);
                return Err(GitError::Timeout(timeout));
            }
        };

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: status.code().unwrap_or(-1),
            success: status.success(),
        };

        if !output.success {
            debug!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.exit_code,
                output.stderr.trim()
            );
        }

        Ok(output)
    }
}

async fn read_pipe<R>(pipe: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match pipe {
        Some(pipe) => pipe.read_to_end(buf).await,
        None => Ok(0),
    }
}
