use crate::config::WatcherConfig;
use crate::error::GitResult;
use crate::git::status::StatusComputer;
use crate::notifier::ChangeNotifier;
use crate::watch::debounce::Debouncer;
use crate::watch::filter::EventFilter;
use crate::watch::gate::PublishGate;
use log::{debug, info, warn};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Everything a watch task needs to recompute and publish
pub(crate) struct WatchContext {
    pub root: PathBuf,
    pub generation: u64,
    pub gate: Arc<PublishGate>,
    pub status: StatusComputer,
    pub notifier: ChangeNotifier,
}

impl WatchContext {
    async fn refresh(&self) {
        let status = self.status.get_status(&self.root).await;
        if !self.gate.publish(self.generation, status, &self.notifier) {
            debug!(
                "Discarding status for {}: watcher generation {} is stale",
                self.root.display(),
                self.generation
            );
        }
    }
}

/// A running watch on one repository root.
///
/// Dropping (or [`stop`](Self::stop)ping) it retires its generation,
/// cancels the pending debounce deadline and releases the filesystem
/// subscription.
pub struct RepositoryWatcher {
    root: PathBuf,
    generation: u64,
    gate: Arc<PublishGate>,
    task: JoinHandle<()>,
    _fs_watcher: Option<RecommendedWatcher>,
}

impl RepositoryWatcher {
    /// Subscribe to filesystem events under `ctx.root` and spawn the watch task
    pub(crate) fn start(ctx: WatchContext, config: &WatcherConfig) -> GitResult<Self> {
        let filter = EventFilter::new(&ctx.root, &config.ignore)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut fs_watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver closes when the watch task ends
            let _ = tx.send(res);
        })?;
        fs_watcher.watch(&ctx.root, RecursiveMode::Recursive)?;

        info!("Watching {}", ctx.root.display());
        Ok(Self::with_events(
            ctx,
            rx,
            filter,
            config.debounce(),
            Some(fs_watcher),
        ))
    }

    /// Spawn the watch task over an arbitrary event source
    pub(crate) fn with_events(
        ctx: WatchContext,
        events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        filter: EventFilter,
        debounce: Duration,
        fs_watcher: Option<RecommendedWatcher>,
    ) -> Self {
        let root = ctx.root.clone();
        let generation = ctx.generation;
        let gate = ctx.gate.clone();
        let task = tokio::spawn(run_watch_loop(ctx, events, filter, debounce));

        Self {
            root,
            generation,
            gate,
            task,
            _fs_watcher: fs_watcher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for RepositoryWatcher {
    fn drop(&mut self) {
        self.gate.retire(self.generation);
        self.task.abort();
        info!("Stopped watching {}", self.root.display());
    }
}

async fn run_watch_loop(
    ctx: WatchContext,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    filter: EventFilter,
    debounce: Duration,
) {
    let mut debouncer = Debouncer::new(debounce);

    loop {
        let deadline = debouncer.deadline();

        tokio::select! {
            event = events.recv() => match event {
                Some(Ok(event)) => {
                    if filter.is_relevant(&event) {
                        debouncer.record(Instant::now());
                    }
                }
                Some(Err(e)) => warn!("File watcher error under {}: {}", ctx.root.display(), e),
                None => break,
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if debouncer.fire_if_due(Instant::now()) {
                    ctx.refresh().await;
                }
            }
        }

        if !ctx.gate.is_current(ctx.generation) {
            break;
        }
    }

    debug!("Watch loop for {} finished", ctx.root.display());
}
