//! Auto-reload scheduling.
//!
//! The [`AutoReloadScheduler`] re-triggers a fetch every `interval_secs`
//! while enabled. It never runs concurrently with a fetch: starting a fetch
//! disarms the timer, and only a completed fetch arms the next one. A failed
//! fetch re-arms too, so background retries continue.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use super::timer::ReloadTimer;

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Auto-reload is off.
    Disabled,
    /// A reload timer is pending.
    Armed,
    /// Enabled, but waiting for an in-flight fetch to complete.
    Suppressed,
}

/// Timer-driven re-invocation of the fetch orchestrator.
pub struct AutoReloadScheduler {
    enabled: bool,
    interval_secs: u64,
    timer: ReloadTimer,
}

impl AutoReloadScheduler {
    pub const MIN_INTERVAL_SECS: u64 = 1;
    /// One day.
    pub const MAX_INTERVAL_SECS: u64 = 86_400;
    pub const DEFAULT_INTERVAL_SECS: u64 = 30;

    /// Create a disabled scheduler whose timer fires are posted on `fired_tx`.
    pub fn new(fired_tx: mpsc::Sender<u64>) -> Self {
        Self {
            enabled: false,
            interval_secs: Self::DEFAULT_INTERVAL_SECS,
            timer: ReloadTimer::new(fired_tx),
        }
    }

    /// Turn auto-reload on or off.
    ///
    /// Turning it off cancels the pending timer immediately. Turning it on arms
    /// a timer unless a fetch is in flight, in which case arming waits for
    /// [`on_fetch_completed`](Self::on_fetch_completed).
    pub fn set_enabled(&mut self, enabled: bool, fetch_in_flight: bool) {
        self.enabled = enabled;
        if !enabled {
            self.timer.cancel();
        } else if !fetch_in_flight && !self.timer.is_armed() {
            self.arm();
        }
        debug!(enabled, fetch_in_flight, state = ?self.state(), "Auto-reload toggled");
    }

    /// Set the interval, clamped to between one second and one day.
    ///
    /// A pending timer is re-armed from now with the new interval. Returns the
    /// interval actually applied.
    pub fn set_interval_secs(&mut self, secs: u64) -> u64 {
        self.interval_secs = secs.clamp(Self::MIN_INTERVAL_SECS, Self::MAX_INTERVAL_SECS);
        if self.timer.is_armed() {
            self.arm();
        }
        self.interval_secs
    }

    /// A fetch started: drop any pending tick.
    pub fn on_fetch_started(&mut self) {
        self.timer.cancel();
    }

    /// A fetch finished (successfully or not): arm the next tick if enabled.
    pub fn on_fetch_completed(&mut self) {
        if self.enabled {
            self.arm();
        }
    }

    /// Consume a timer fire. Returns `true` if the caller should fetch now.
    pub fn take_fired(&mut self, generation: u64) -> bool {
        self.enabled && self.timer.take_fired(generation)
    }

    /// Cancel the pending timer without changing the enabled flag.
    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    pub fn state(&self) -> SchedulerState {
        if !self.enabled {
            SchedulerState::Disabled
        } else if self.timer.is_armed() {
            SchedulerState::Armed
        } else {
            SchedulerState::Suppressed
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    /// When the next auto-reload is due, if armed.
    pub fn next_reload_at(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    fn arm(&mut self) {
        self.timer.arm(Duration::from_secs(self.interval_secs));
    }
}
