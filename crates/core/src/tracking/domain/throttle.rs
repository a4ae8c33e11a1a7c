use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::shared::constants::{CYCLE_PAUSE_MS, ITEM_BUDGET, ITEM_INTERVAL_MS, STARTUP_DELAY_MS};

/// Pacing of a tracking worker.
///
/// `item_budget` vertex writes are admitted per `item_interval`; a budget of
/// 0 or a zero interval admits writes without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub startup_delay: Duration,
    pub cycle_pause: Duration,
    pub item_budget: u32,
    pub item_interval: Duration,
}

impl ThrottlePolicy {
    pub fn unthrottled() -> Self {
        Self {
            startup_delay: Duration::ZERO,
            cycle_pause: Duration::ZERO,
            item_budget: 0,
            item_interval: Duration::ZERO,
        }
    }

    pub fn limits_items(&self) -> bool {
        self.item_budget > 0 && !self.item_interval.is_zero()
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_millis(STARTUP_DELAY_MS),
            cycle_pause: Duration::from_millis(CYCLE_PAUSE_MS),
            item_budget: ITEM_BUDGET,
            item_interval: Duration::from_millis(ITEM_INTERVAL_MS),
        }
    }
}

/// Token-window rate limiter for per-item writes.
pub struct ItemThrottle {
    budget: u32,
    interval: Duration,
    window_start: Option<Instant>,
    used: u32,
}

impl ItemThrottle {
    pub fn new(policy: &ThrottlePolicy) -> Self {
        Self {
            budget: policy.item_budget,
            interval: policy.item_interval,
            window_start: None,
            used: 0,
        }
    }

    /// Blocks until the next item may be written. Never interrupted by stop.
    pub fn admit(&mut self) {
        if self.budget == 0 || self.interval.is_zero() {
            return;
        }

        let now = Instant::now();
        let start = match self.window_start {
            Some(start) if now.duration_since(start) < self.interval => start,
            _ => {
                self.window_start = Some(now);
                self.used = 0;
                now
            }
        };

        if self.used < self.budget {
            self.used += 1;
            return;
        }

        let next_window = start + self.interval;
        std::thread::sleep(next_window.saturating_duration_since(now));
        self.window_start = Some(next_window);
        self.used = 1;
    }
}

/// Cooperative stop flag with a wake-up for interruptible pauses.
#[derive(Debug)]
pub struct StopSignal {
    requested: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        Self {
            requested: AtomicBool::new(false),
            wake_tx,
            wake_rx,
        }
    }

    /// Idempotent. Returns true for the call that actually raised the flag.
    pub fn request(&self) -> bool {
        if self.requested.swap(true, Ordering::AcqRel) {
            return false;
        }
        let _ = self.wake_tx.try_send(());
        true
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Sleeps for `duration` or until stop is requested. Returns whether stop was requested.
    pub fn pause(&self, duration: Duration) -> bool {
        if self.is_requested() {
            return true;
        }
        if duration.is_zero() {
            return false;
        }
        match self.wake_rx.recv_timeout(duration) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => self.is_requested(),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
