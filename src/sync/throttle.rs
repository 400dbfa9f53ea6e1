//! Leading + trailing edge throttle
//!
//! The first request in a quiet period fires immediately. Requests inside the
//! window collapse into one trailing fire at the end of the window. The
//! throttle only keeps time; the caller decides what to publish when it fires.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_fire: Option<Instant>,
    deadline: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fire: None,
            deadline: None,
        }
    }

    /// Ask to fire at `now`. Returns `true` if the caller should publish
    /// immediately, otherwise a trailing fire is scheduled.
    pub fn request(&mut self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) if now < last + self.interval => {
                self.deadline = Some(last + self.interval);
                false
            }
            _ => {
                self.deadline = None;
                self.last_fire = Some(now);
                true
            }
        }
    }

    /// Time of the scheduled trailing fire, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the trailing fire if it is due at `now`
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.last_fire = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Drop any scheduled trailing fire
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
