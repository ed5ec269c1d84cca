//! Single-shot cancellable reload timer.
//!
//! Arming spawns a sleeping task that posts the timer's generation to the
//! session queue when it elapses. Cancelling aborts the task and forgets the
//! generation before returning, so a fire that was already queued is
//! recognised as stale by [`ReloadTimer::take_fired`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::debug;

struct Armed {
    generation: u64,
    /// `None` when the delay is beyond what `Instant` can represent.
    deadline: Option<Instant>,
    task: JoinHandle<()>,
}

/// A one-shot timer with explicit arm/cancel and stale-fire detection.
pub struct ReloadTimer {
    fired_tx: mpsc::Sender<u64>,
    armed: Option<Armed>,
    next_generation: u64,
}

impl ReloadTimer {
    /// Create a disarmed timer that reports fires on `fired_tx`.
    pub fn new(fired_tx: mpsc::Sender<u64>) -> Self {
        Self {
            fired_tx,
            armed: None,
            next_generation: 0,
        }
    }

    /// Arm the timer to fire after `delay`, replacing any pending timer.
    ///
    /// Must be called from within a Tokio runtime. Returns the generation the
    /// fire will carry.
    pub fn arm(&mut self, delay: Duration) -> u64 {
        self.cancel();

        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            sleep(delay).await;
            if tx.send(generation).await.is_err() {
                debug!(generation, "Reload receiver dropped; discarding tick");
            }
        });

        debug!(generation, delay_secs = delay.as_secs(), "Reload timer armed");
        self.armed = Some(Armed {
            generation,
            deadline: Instant::now().checked_add(delay),
            task,
        });
        generation
    }

    /// Cancel the pending timer, if any. Safe to call when disarmed.
    ///
    /// Returns `true` if a timer was pending.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.task.abort();
                debug!(generation = armed.generation, "Reload timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Consume a fire. Returns `true` only for the currently armed generation,
    /// after which the timer is disarmed.
    pub fn take_fired(&mut self, generation: u64) -> bool {
        match &self.armed {
            Some(armed) if armed.generation == generation => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// When the pending timer will fire.
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.as_ref().and_then(|a| a.deadline)
    }
}

impl Drop for ReloadTimer {
    fn drop(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = ReloadTimer::new(tx);

        let generation = timer.arm(Duration::from_secs(5));
        assert!(timer.is_armed());

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, generation);
        assert!(timer.take_fired(fired));
        assert!(!timer.is_armed());
        assert!(!timer.take_fired(fired));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = ReloadTimer::new(tx);

        timer.arm(Duration::from_secs(1));
        assert!(timer.cancel());
        assert!(!timer.is_armed());
        assert!(!timer.cancel());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_invalidates_previous_generation() {
        let (tx, _rx) = mpsc::channel(4);
        let mut timer = ReloadTimer::new(tx);

        let first = timer.arm(Duration::from_secs(5));
        let second = timer.arm(Duration::from_secs(5));
        assert_ne!(first, second);
        assert!(!timer.take_fired(first));
        assert!(timer.is_armed());
        assert!(timer.take_fired(second));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_tracks_delay() {
        let (tx, _rx) = mpsc::channel(4);
        let mut timer = ReloadTimer::new(tx);
        assert!(timer.deadline().is_none());

        let start = Instant::now();
        timer.arm(Duration::from_secs(7));
        assert_eq!(timer.deadline(), Some(start + Duration::from_secs(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_delay_arms_without_deadline() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = ReloadTimer::new(tx);

        timer.arm(Duration::MAX);
        assert!(timer.is_armed());
        assert!(timer.deadline().is_none());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(rx.try_recv().is_err());
        assert!(timer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn fire_after_receiver_dropped_is_harmless() {
        let (tx, rx) = mpsc::channel(4);
        let mut timer = ReloadTimer::new(tx);
        drop(rx);

        timer.arm(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(timer.is_armed());
    }
}
