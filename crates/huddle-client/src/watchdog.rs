//! Inactivity watchdog.
//!
//! A poll-based timer reset by user-interaction signals. When it fires the
//! owner erases key material, surfaces a session-ended notice, and returns
//! to the entry point. Poll-based (no background thread) so teardown cannot
//! leave a dangling timer behind.

use std::time::{Duration, Instant};

/// How long without activity before the session ends (deployment
/// decision: 5 min).
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// One-shot inactivity timer.
#[derive(Debug)]
pub struct InactivityWatchdog {
    deadline: Option<Instant>,
    timeout: Duration,
}

impl InactivityWatchdog {
    /// Arm the watchdog starting from `now`.
    pub fn new(now: Instant) -> Self {
        Self::with_timeout(now, INACTIVITY_TIMEOUT)
    }

    /// Arm with a custom timeout.
    pub fn with_timeout(now: Instant, timeout: Duration) -> Self {
        Self { deadline: Some(now + timeout), timeout }
    }

    /// Reset the deadline; call on pointer move, key press, click.
    pub fn record_activity(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    /// Check the deadline. Returns `true` exactly once when it elapses;
    /// the watchdog then stays disarmed until the next activity signal.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            },
            _ => false,
        }
    }

    /// Disarm permanently (teardown).
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_timeout() {
        let start = Instant::now();
        let mut dog = InactivityWatchdog::with_timeout(start, Duration::from_secs(10));

        assert!(!dog.poll(start + Duration::from_secs(9)));
        assert!(dog.poll(start + Duration::from_secs(10)));
    }

    #[test]
    fn activity_pushes_deadline() {
        let start = Instant::now();
        let mut dog = InactivityWatchdog::with_timeout(start, Duration::from_secs(10));

        dog.record_activity(start + Duration::from_secs(8));
        assert!(!dog.poll(start + Duration::from_secs(15)));
        assert!(dog.poll(start + Duration::from_secs(18)));
    }

    #[test]
    fn fires_only_once_until_next_activity() {
        let start = Instant::now();
        let mut dog = InactivityWatchdog::with_timeout(start, Duration::from_secs(1));

        assert!(dog.poll(start + Duration::from_secs(2)));
        assert!(!dog.poll(start + Duration::from_secs(60)));

        dog.record_activity(start + Duration::from_secs(60));
        assert!(dog.poll(start + Duration::from_secs(62)));
    }

    #[test]
    fn cancelled_watchdog_never_fires() {
        let start = Instant::now();
        let mut dog = InactivityWatchdog::with_timeout(start, Duration::from_secs(1));
        dog.cancel();
        assert!(!dog.poll(start + Duration::from_secs(600)));
    }
}
