use crate::git::types::StatusMap;
use crate::notifier::ChangeNotifier;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct GateState {
    generation: u64,
    last_status: Option<StatusMap>,
}

/// Generation counter deciding whether a finished recompute may publish.
///
/// Starting or stopping a watcher advances the generation while holding
/// the publish lock; a recompute delivers only under that same lock and
/// only if its generation is still current. Once `advance` returns, no
/// older generation can publish.
///
/// Subscribers run with the publish lock held but not the state lock, so
/// they may read [`last_status`](Self::last_status).
#[derive(Debug, Default)]
pub struct PublishGate {
    publishing: Mutex<()>,
    state: Mutex<GateState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PublishGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every outstanding generation and clear the cached status
    pub fn advance(&self) -> u64 {
        let _publishing = lock(&self.publishing);
        let mut state = lock(&self.state);
        state.generation += 1;
        state.last_status = None;
        state.generation
    }

    /// Advance only if `generation` is still the current one
    pub fn retire(&self, generation: u64) {
        let _publishing = lock(&self.publishing);
        let mut state = lock(&self.state);
        if state.generation == generation {
            state.generation += 1;
            state.last_status = None;
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        lock(&self.state).generation == generation
    }

    /// Publish `status` if `generation` is current; returns whether it was delivered
    pub fn publish(
        &self,
        generation: u64,
        status: Option<StatusMap>,
        notifier: &ChangeNotifier,
    ) -> bool {
        let _publishing = lock(&self.publishing);
        {
            let mut state = lock(&self.state);
            if state.generation != generation {
                return false;
            }
            state.last_status = status.clone();
        }

        notifier.publish(status.as_ref());
        true
    }

    /// Last status published by the current generation
    pub fn last_status(&self) -> Option<StatusMap> {
        lock(&self.state).last_status.clone()
    }
}
