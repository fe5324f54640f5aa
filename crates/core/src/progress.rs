//! Progress reporting for a single `process` call.
//!
//! All reports, including those from the synthetic ticker task, are
//! delivered one at a time in [`ProgressTracker`]. That gives two guarantees
//! callers rely on: values delivered to the callback never decrease, and once
//! a [`TickerGuard`] is dropped no further tick reaches the callback.
//!
//! The callback runs without the state lock held, so it may read progress or
//! reset the processor that owns the tracker.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

/// Caller-supplied progress sink: `(percent in 0..=100, status message)`.
pub type ProgressCallback = Arc<dyn Fn(u8, &str) + Send + Sync>;

/// Wrap a closure as a [`ProgressCallback`].
pub fn callback<F>(f: F) -> ProgressCallback
where
    F: Fn(u8, &str) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Snapshot of the most recent report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub percent: u8,
    pub message: String,
}

struct TrackerState {
    current: ProgressState,
    ticker: Option<AbortHandle>,
    closed: bool,
}

pub(crate) struct ProgressTracker {
    state: Mutex<TrackerState>,
    /// Held across a state update and its callback, in that lock order.
    delivery: Mutex<()>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TrackerState {
                current: ProgressState::default(),
                ticker: None,
                closed: false,
            }),
            delivery: Mutex::new(()),
            callback,
        })
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Report progress. Values below the current one are raised to it.
    pub(crate) fn report(&self, percent: u8, message: &str) {
        let _delivering = self.lock_delivery();
        let update = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.current.percent = percent.min(100).max(state.current.percent);
            state.current.message = message.to_string();
            state.current.clone()
        };
        self.emit(&update);
    }

    /// One ticker step. Returns false once the ticker has been stopped.
    fn tick(&self, ceiling: u8) -> bool {
        let _delivering = self.lock_delivery();
        let update = {
            let mut state = self.lock();
            if state.closed || state.ticker.is_none() {
                return false;
            }
            if state.current.percent >= ceiling {
                return true;
            }
            state.current.percent += 1;
            trace!("Synthetic progress tick to {}%", state.current.percent);
            state.current.clone()
        };
        self.emit(&update);
        true
    }

    fn emit(&self, update: &ProgressState) {
        if let Some(callback) = &self.callback {
            callback(update.percent, &update.message);
        }
    }

    pub(crate) fn snapshot(&self) -> ProgressState {
        self.lock().current.clone()
    }

    fn register_ticker(&self, handle: AbortHandle) {
        let mut state = self.lock();
        if state.closed {
            handle.abort();
            return;
        }
        if let Some(previous) = state.ticker.replace(handle) {
            previous.abort();
        }
    }

    /// Waits for a tick that is being delivered, so none arrives afterwards.
    fn stop_ticker(&self) {
        let _delivering = self.lock_delivery();
        if let Some(handle) = self.lock().ticker.take() {
            handle.abort();
        }
    }

    /// Stop the ticker and drop every later report. Safe to call from inside
    /// the callback.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        if let Some(handle) = state.ticker.take() {
            handle.abort();
        }
    }
}

/// Keeps the synthetic ticker alive for as long as it is held.
///
/// Every `period` the ticker bumps progress by one and re-sends the current
/// message, until `ceiling` is reached.
pub(crate) struct TickerGuard {
    tracker: Arc<ProgressTracker>,
}

impl TickerGuard {
    pub(crate) fn start(tracker: Arc<ProgressTracker>, period: Duration, ceiling: u8) -> Self {
        let ticking = Arc::clone(&tracker);
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !ticking.tick(ceiling) {
                    break;
                }
            }
        });
        tracker.register_ticker(handle.abort_handle());
        Self { tracker }
    }
}

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.tracker.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn recording() -> (ProgressCallback, Arc<Mutex<Vec<(u8, String)>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let cb = callback(move |percent, message| {
            sink.lock().unwrap().push((percent, message.to_string()));
        });
        (cb, events)
    }

    #[test]
    fn test_report_forwards_to_callback() {
        let (cb, events) = recording();
        let tracker = ProgressTracker::new(Some(cb));
        tracker.report(5, "Loading");
        tracker.report(85, "Converting");

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![(5, "Loading".to_string()), (85, "Converting".to_string())]
        );
    }

    #[test]
    fn test_report_never_decreases() {
        let (cb, events) = recording();
        let tracker = ProgressTracker::new(Some(cb));
        tracker.report(40, "a");
        tracker.report(10, "b");

        assert_eq!(tracker.snapshot().percent, 40);
        assert_eq!(tracker.snapshot().message, "b");
        assert_eq!(events.lock().unwrap()[1].0, 40);
    }

    #[test]
    fn test_report_clamps_to_100() {
        let tracker = ProgressTracker::new(None);
        tracker.report(250, "over");
        assert_eq!(tracker.snapshot().percent, 100);
    }

    #[test]
    fn test_closed_tracker_ignores_reports() {
        let (cb, events) = recording();
        let tracker = ProgressTracker::new(Some(cb));
        tracker.report(5, "before");
        tracker.close();
        tracker.report(50, "after");

        assert_eq!(events.lock().unwrap().len(), 1);
        assert_eq!(tracker.snapshot().percent, 5);
    }

    #[test]
    fn test_tick_without_ticker_is_noop() {
        let tracker = ProgressTracker::new(None);
        assert!(!tracker.tick(98));
        assert_eq!(tracker.snapshot().percent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_advances_and_stops_at_ceiling() {
        let (cb, events) = recording();
        let tracker = ProgressTracker::new(Some(cb));
        tracker.report(95, "Converting");

        let guard = TickerGuard::start(Arc::clone(&tracker), Duration::from_millis(800), 98);
        tokio::time::sleep(Duration::from_millis(10 * 800 + 100)).await;

        assert_eq!(tracker.snapshot().percent, 98);
        let percents: Vec<u8> = events.lock().unwrap().iter().map(|(p, _)| *p).collect();
        assert_eq!(percents, vec![95, 96, 97, 98]);
        assert!(events
            .lock()
            .unwrap()
            .iter()
            .all(|(_, m)| m == "Converting"));
        drop(guard);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_first_tick_after_one_period() {
        let (cb, events) = recording();
        let tracker = ProgressTracker::new(Some(cb));
        let _guard = TickerGuard::start(Arc::clone(&tracker), Duration::from_millis(800), 98);

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(events.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_guard_stops_ticks() {
        let (cb, events) = recording();
        let tracker = ProgressTracker::new(Some(cb));
        let guard = TickerGuard::start(Arc::clone(&tracker), Duration::from_millis(800), 98);

        tokio::time::sleep(Duration::from_millis(2 * 800 + 100)).await;
        drop(guard);
        let seen = events.lock().unwrap().len();
        assert_eq!(seen, 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(events.lock().unwrap().len(), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_ticks() {
        let (cb, events) = recording();
        let tracker = ProgressTracker::new(Some(cb));
        let _guard = TickerGuard::start(Arc::clone(&tracker), Duration::from_millis(800), 98);

        tokio::time::sleep(Duration::from_millis(900)).await;
        tracker.close();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_callback_can_read_and_close_its_tracker() {
        let cell: Arc<OnceLock<Arc<ProgressTracker>>> = Arc::new(OnceLock::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (inner, sink) = (Arc::clone(&cell), Arc::clone(&seen));
        let tracker = ProgressTracker::new(Some(callback(move |percent, _| {
            if let Some(tracker) = inner.get() {
                sink.lock().unwrap().push(tracker.snapshot().percent);
                if percent >= 50 {
                    tracker.close();
                }
            }
        })));
        assert!(cell.set(Arc::clone(&tracker)).is_ok());

        tracker.report(5, "Loading");
        tracker.report(50, "Halfway");
        tracker.report(90, "Ignored");

        assert_eq!(*seen.lock().unwrap(), vec![5, 50]);
        assert_eq!(tracker.snapshot().percent, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_callback_can_read_tracker() {
        let cell: Arc<OnceLock<Arc<ProgressTracker>>> = Arc::new(OnceLock::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (inner, sink) = (Arc::clone(&cell), Arc::clone(&seen));
        let tracker = ProgressTracker::new(Some(callback(move |_, _| {
            if let Some(tracker) = inner.get() {
                sink.lock().unwrap().push(tracker.snapshot().percent);
            }
        })));
        assert!(cell.set(Arc::clone(&tracker)).is_ok());

        let guard = TickerGuard::start(Arc::clone(&tracker), Duration::from_millis(800), 98);
        tokio::time::sleep(Duration::from_millis(3 * 800 + 100)).await;
        drop(guard);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }
}
