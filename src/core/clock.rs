//! Monotonic time source with a wall-clock anchor.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Engine clock.
///
/// Deadlines use tokio's monotonic [`Instant`], so paused-time tests drive
/// every timeout. Wall-clock timestamps are derived from the same instants so
/// they advance together.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
}

impl Clock {
    /// Anchor a clock at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: Utc::now(),
        }
    }

    /// Current monotonic instant.
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Wall-clock time of `at`.
    pub fn wall(&self, at: Instant) -> DateTime<Utc> {
        let elapsed = at.saturating_duration_since(self.origin);
        self.wall_origin + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }

    /// Current wall-clock time.
    pub fn wall_now(&self) -> DateTime<Utc> {
        self.wall(self.now())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_wall_follows_monotonic() {
        let clock = Clock::new();
        let before = clock.wall_now();

        tokio::time::advance(Duration::from_secs(90)).await;

        let after = clock.wall_now();
        assert_eq!((after - before).num_seconds(), 90);
    }
}
