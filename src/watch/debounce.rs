use std::time::Duration;
use tokio::time::Instant;

/// Trailing-edge debounce state with a single pending deadline.
///
/// Time is passed in by the caller, so the state machine can be driven by
/// a virtual clock in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Register an event; (re)arms the deadline to `now + window`
    pub fn record(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// When the pending recompute is due, if one is pending
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending deadline if it has passed.
    ///
    /// Returns true exactly once per quiet period.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Feed events at the given offsets, polling every 10ms, and count fires
    fn count_fires(event_offsets_ms: &[u64], run_for_ms: u64) -> usize {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        let mut fires = 0;

        for t in (0..=run_for_ms).step_by(10) {
            let now = start + ms(t);
            if event_offsets_ms.contains(&t) {
                debouncer.record(now);
            }
            if debouncer.fire_if_due(now) {
                fires += 1;
            }
        }
        fires
    }

    #[test]
    fn test_burst_within_window_fires_once() {
        assert_eq!(count_fires(&[0, 50, 100, 150, 200], 2_000), 1);
    }

    #[test]
    fn test_separated_events_fire_twice() {
        assert_eq!(count_fires(&[0, 400], 2_000), 2);
    }

    #[test]
    fn test_events_reset_the_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.record(start);
        debouncer.record(start + ms(250));
        assert!(!debouncer.fire_if_due(start + ms(300)));
        assert_eq!(debouncer.deadline(), Some(start + ms(550)));
        assert!(debouncer.fire_if_due(start + ms(550)));
        assert_eq!(debouncer.deadline(), None);
        assert!(!debouncer.fire_if_due(start + ms(10_000)));
    }
}
