//! Background refresh loop with adaptive interval and exponential backoff.
//!
//! The interval is controlled externally via a `watch::Receiver<u64>`: the
//! main loop writes a short interval while any run is Active and the idle
//! interval otherwise, and the poller picks up the change on its next
//! `tokio::select!` cycle without being restarted.
//!
//! Each cycle is one [`Coordinator::refresh_background`] attempt. Failures
//! are never reported to the UI; they only stretch the next delay
//! (`base × 2^failures`, capped at [`MAX_BACKOFF_SECS`]).

use crate::coordinator::Coordinator;
use crate::events::AppEvent;
use crate::retry::{backoff_delay, LoadOutcome, MAX_BACKOFF_SECS};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time;

/// Seconds between background refreshes while a run is still moving.
pub const POLL_INTERVAL_ACTIVE: u64 = 5;

/// Interval the poller should use given the current activity.
pub fn poll_interval(has_active: bool, idle: u64) -> u64 {
    if has_active {
        POLL_INTERVAL_ACTIVE.min(idle.max(1))
    } else {
        idle.max(1)
    }
}

/// Delay before the next cycle after `failures` consecutive failures.
pub fn next_delay(base_interval: u64, failures: u32) -> u64 {
    if failures > 0 {
        backoff_delay(base_interval, failures).min(MAX_BACKOFF_SECS)
    } else {
        base_interval.max(1)
    }
}

pub struct Poller {
    coordinator: Arc<Coordinator>,
    tx: mpsc::UnboundedSender<AppEvent>,
    interval_rx: watch::Receiver<u64>,
}

enum PollOutcome {
    Success,
    Failure,
    ChannelClosed,
}

impl Poller {
    pub fn new(
        coordinator: Arc<Coordinator>,
        tx: mpsc::UnboundedSender<AppEvent>,
        interval_rx: watch::Receiver<u64>,
    ) -> Self {
        Self {
            coordinator,
            tx,
            interval_rx,
        }
    }

    /// The first load is the foreground one, so the loop starts by waiting.
    pub async fn run(mut self) {
        let mut failures: u32 = 0;
        loop {
            let base_interval = *self.interval_rx.borrow();
            let delay = next_delay(base_interval, failures);
            tokio::select! {
                () = time::sleep(time::Duration::from_secs(delay)) => {},
                changed = self.interval_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    // New interval: restart the wait with it.
                    continue;
                },
            }

            match self.poll_once().await {
                PollOutcome::Success => failures = 0,
                PollOutcome::Failure => {
                    failures = failures.saturating_add(1);
                    tracing::debug!(
                        "background refresh failed {failures}x, next in {}s",
                        next_delay(base_interval, failures)
                    );
                }
                PollOutcome::ChannelClosed => return,
            }
        }
    }

    async fn poll_once(&self) -> PollOutcome {
        let outcome = self.coordinator.refresh_background().await;
        if let LoadOutcome::Transient(msg) | LoadOutcome::Exhausted(msg) = &outcome {
            tracing::debug!("background refresh: {msg}");
            return PollOutcome::Failure;
        }
        let event = AppEvent::OverviewLoaded {
            ticket: None,
            outcome,
            manual: false,
        };
        if self.tx.send(event).is_err() {
            tracing::warn!("poller: channel closed");
            return PollOutcome::ChannelClosed;
        }
        PollOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_runs_poll_fast() {
        assert_eq!(poll_interval(true, 30), POLL_INTERVAL_ACTIVE);
        assert_eq!(poll_interval(false, 30), 30);
    }

    #[test]
    fn idle_interval_shorter_than_active_wins() {
        assert_eq!(poll_interval(true, 2), 2);
    }

    #[test]
    fn zero_interval_floors_to_one() {
        assert_eq!(poll_interval(false, 0), 1);
        assert_eq!(next_delay(0, 0), 1);
    }

    #[test]
    fn failures_back_off_exponentially() {
        assert_eq!(next_delay(30, 0), 30);
        assert_eq!(next_delay(30, 1), 60);
        assert_eq!(next_delay(30, 2), 120);
        assert_eq!(next_delay(30, 20), MAX_BACKOFF_SECS);
    }
}
