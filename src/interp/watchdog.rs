//! Progress watchdog
//!
//! The worker pulses the watchdog at the start and end of every event. A
//! supervisor task checks it on a fixed tick and cancels the run once the
//! time since the last pulse exceeds the timeout plus any wait extension.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct WatchdogState {
    last_activity: Instant,
    /// Extra allowance for a known long wait; cleared by the next pulse
    extension: Duration,
    tripped: bool,
}

impl WatchdogState {
    fn expired(&self, timeout: Duration) -> bool {
        Instant::now().saturating_duration_since(self.last_activity)
            > timeout.saturating_add(self.extension)
    }
}

/// Tracks the last time the worker made progress
#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    state: Mutex<WatchdogState>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: Mutex::new(WatchdogState {
                last_activity: Instant::now(),
                extension: Duration::ZERO,
                tripped: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, WatchdogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record progress
    pub fn pulse(&self) {
        let mut state = self.state();
        state.last_activity = Instant::now();
        state.extension = Duration::ZERO;
    }

    /// Allow `by` on top of the timeout until the next pulse
    pub fn extend(&self, by: Duration) {
        self.state().extension = by;
    }

    /// Time since the last pulse
    pub fn idle(&self) -> Duration {
        Instant::now().saturating_duration_since(self.state().last_activity)
    }

    pub fn expired(&self) -> bool {
        self.state().expired(self.timeout)
    }

    /// Mark the watchdog tripped if it has expired; returns whether it is tripped
    pub fn check(&self) -> bool {
        let mut state = self.state();
        if !state.tripped && state.expired(self.timeout) {
            state.tripped = true;
        }
        state.tripped
    }

    pub fn is_tripped(&self) -> bool {
        self.state().tripped
    }
}

/// Check the watchdog every `poll` until it trips (cancelling `cancel`),
/// `cancel` is cancelled by someone else, or `done` is cancelled
pub async fn supervise(
    watchdog: std::sync::Arc<Watchdog>,
    cancel: CancellationToken,
    done: CancellationToken,
    poll: Duration,
) {
    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = done.cancelled() => return,
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if watchdog.check() {
                    tracing::error!(
                        idle_secs = watchdog.idle().as_secs(),
                        timeout_secs = watchdog.timeout().as_secs(),
                        "Watchdog expired, stopping run"
                    );
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}
