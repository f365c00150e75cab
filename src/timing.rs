use std::time::{Duration, Instant};

/// Fires once, `delay` after the most recent [`Debouncer::touch`].
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }
    /// Restart the wait, dropping any earlier pending fire.
    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
    /// True exactly once when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
