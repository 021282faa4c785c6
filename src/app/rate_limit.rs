//! Sliding-window rate limiter for one webhook endpoint.

/// Discord's published webhook limit.
pub const WINDOW_MS: i64 = 60_000;
pub const CAPACITY: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allowed,
    Denied { reset_ms: i64 },
}

/// Tracks the timestamps of the most recent successful sends. Owned
/// exclusively by one dispatcher, so no locking is involved.
#[derive(Debug)]
pub struct SlidingWindow {
    window_ms: i64,
    capacity: usize,
    stamps: Vec<i64>,
}

impl SlidingWindow {
    pub fn new(window_ms: i64, capacity: usize) -> Self {
        Self {
            window_ms,
            capacity,
            stamps: Vec::new(),
        }
    }

    /// Expires stamps outside the window, then reports whether another send
    /// is allowed and, if not, how long until the window opens.
    pub fn check(&mut self, now_ms: i64) -> Gate {
        let deadline = now_ms - self.window_ms;
        self.stamps.retain(|t| *t > deadline);
        if self.stamps.len() < self.capacity {
            return Gate::Allowed;
        }
        let oldest = self.stamps.iter().copied().min().unwrap_or(now_ms);
        Gate::Denied {
            reset_ms: (oldest + self.window_ms - now_ms).max(0),
        }
    }

    pub fn record(&mut self, now_ms: i64) {
        self.stamps.push(now_ms);
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(WINDOW_MS, CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_capacity() {
        let mut rl = SlidingWindow::new(60_000, 3);
        for i in 0..3 {
            assert_eq!(rl.check(i), Gate::Allowed);
            rl.record(i);
        }
        assert!(matches!(rl.check(10), Gate::Denied { .. }));
    }

    #[test]
    fn reset_counts_from_oldest_stamp() {
        let mut rl = SlidingWindow::new(60_000, 2);
        rl.record(1_000);
        rl.record(2_000);
        match rl.check(10_000) {
            Gate::Denied { reset_ms } => assert_eq!(reset_ms, 51_000),
            g => panic!("expected denial, got {g:?}"),
        }
    }

    #[test]
    fn stamps_expire_after_the_window() {
        let mut rl = SlidingWindow::new(60_000, 1);
        rl.record(0);
        assert!(matches!(rl.check(59_999), Gate::Denied { .. }));
        assert_eq!(rl.check(60_001), Gate::Allowed);
    }

    #[test]
    fn forty_sends_split_across_two_windows() {
        let mut rl = SlidingWindow::default();
        let mut now = 0;
        let mut sent_in_first_minute = 0;
        for _ in 0..40 {
            match rl.check(now) {
                Gate::Allowed => {
                    rl.record(now);
                    if now < 60_000 {
                        sent_in_first_minute += 1;
                    }
                    now += 10;
                }
                Gate::Denied { reset_ms } => now += reset_ms,
            }
        }
        assert_eq!(sent_in_first_minute, 30);
    }
}
