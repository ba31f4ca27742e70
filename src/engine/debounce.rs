// src/engine/debounce.rs

//! Clock-injected debounce.
//!
//! The debouncer never sleeps or spawns anything; the session loop asks for
//! the next [`deadline`](Debouncer::deadline) and calls
//! [`poll`](Debouncer::poll) once it has passed. This keeps it testable with
//! plain `Instant` arithmetic.

use std::time::Duration;

use tokio::time::Instant;

/// Collapses a burst of calls into one, delivering the last call's value.
///
/// - Every call (re)arms the timer to `now + delay`.
/// - Trailing edge: once the timer expires, the most recent value fires.
/// - With `leading = true`, the first call of a burst fires immediately and
///   the trailing edge only fires if more calls arrived during the wait.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    leading: bool,
    deadline: Option<Instant>,
    pending: Option<T>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration, leading: bool) -> Self {
        Self {
            delay,
            leading,
            deadline: None,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a call at `now`. Returns the value back if it fires on the
    /// leading edge.
    pub fn call(&mut self, now: Instant, value: T) -> Option<T> {
        let starts_burst = self.deadline.is_none();
        self.deadline = Some(now + self.delay);

        if starts_burst && self.leading {
            self.pending = None;
            return Some(value);
        }

        self.pending = Some(value);
        None
    }

    /// When the trailing edge is due, if a burst is in progress.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fire the trailing edge if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Drop any pending burst without firing it.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
    }
}
