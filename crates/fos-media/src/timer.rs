//! Repeating Timer
//!
//! Deadline-based timer polled by the owning event loop. Nothing fires on
//! its own, so stopping it is synchronous: once `stop` returns no further
//! tick can be observed.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RepeatingTimer {
    interval: Duration,
    next_fire: Option<Instant>,
}

impl RepeatingTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_fire: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_fire.is_some()
    }

    /// When the next tick is due, if running
    pub fn deadline(&self) -> Option<Instant> {
        self.next_fire
    }

    /// Start ticking; a running timer keeps its current deadline
    pub fn start(&mut self, now: Instant) {
        if self.next_fire.is_none() {
            self.next_fire = Some(now + self.interval);
        }
    }

    /// Start ticking with a fresh deadline
    pub fn restart(&mut self, now: Instant) {
        self.next_fire = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next_fire = None;
    }

    /// Consume a due tick. Missed ticks are not replayed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.next_fire {
            Some(deadline) if now >= deadline => {
                self.next_fire = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}
