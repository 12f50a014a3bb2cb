use clap::{Parser, Subcommand};
use gitpulse::git::GitExecutor;
use gitpulse::graph::{self, DEFAULT_PALETTE_SIZE};
use gitpulse::{AppResult, EngineConfig, GitEngine, GitVersion};
use log::{debug, info};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

/// gitpulse - watch and inspect the state of a git working tree
#[derive(Parser, Debug)]
#[command(name = "gitpulse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level regardless of configuration
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the status map as JSON
    Status {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// List changed files with their staged flag
    Changes {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// List local and remote-tracking branches
    Branches {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Print a page of history with graph lanes
    Log {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Commits per page (defaults to history.page_size)
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        skip: usize,
    },
    /// Print a JSON line for every status change until interrupted
    Watch {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match EngineConfig::load().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    init_logging(&config, cli.debug);

    let runner = GitExecutor::new(&config.git.binary);
    match GitVersion::validate(&runner, config.git.timeout()).await {
        Ok(version) => debug!("Git version: {}", version),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }

    if let Err(e) = run(cli.command, config).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(config: &EngineConfig, debug: bool) {
    let level = if debug { "debug" } else { config.logging.level.as_str() };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

async fn run(command: Command, config: EngineConfig) -> AppResult<()> {
    let page_size = config.history.page_size;
    let engine = GitEngine::new(config);

    match command {
        Command::Status { path } => print_json(&engine.get_status(resolve(&path)?).await)?,
        Command::Changes { path } => print_json(&engine.get_changes(resolve(&path)?).await)?,
        Command::Branches { path } => print_json(&engine.get_branches(resolve(&path)?).await)?,
        Command::Log { path, limit, skip } => {
            let path = resolve(&path)?;
            let commits = engine
                .get_commits(&path, limit.unwrap_or(page_size), skip)
                .await;
            let positions = GitEngine::layout_commit_graph(&commits);

            let mut stdout = io::stdout().lock();
            for commit in &commits {
                let Some(position) = positions.get(&commit.hash) else {
                    continue;
                };
                writeln!(
                    stdout,
                    "{:<8} c{} {} {} ({}) {}",
                    graph::lane_markers(position),
                    graph::lane_color(position.column, DEFAULT_PALETTE_SIZE),
                    &commit.hash[..commit.hash.len().min(7)],
                    commit.date.format("%Y-%m-%d"),
                    commit.branch,
                    commit.message
                )?;
            }
        }
        Command::Watch { path } => {
            let path = resolve(&path)?;
            let (_subscription, mut updates) = engine.status_channel();
            engine.start_watcher(&path).await;
            if engine.watched_root().is_none() {
                info!("{} is not a repository", path.display());
                // Only the initial `null` was published
                if let Ok(status) = updates.try_recv() {
                    print_json(&status)?;
                }
                return Ok(());
            }

            loop {
                tokio::select! {
                    update = updates.recv() => match update {
                        Some(status) => print_json(&status)?,
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            engine.stop_watcher();
        }
    }

    Ok(())
}

/// Status keys and watch events use absolute paths
fn resolve(path: &Path) -> AppResult<PathBuf> {
    Ok(std::path::absolute(path)?)
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
