//! Visibility timeout manager.
//!
//! Tracks every in-flight delivery of one queue. Each delivery is `Armed` with
//! a deadline until it is either disarmed (delete, redrive, retention) or
//! fires (the owner returns the message to the visible set). The manager is
//! owned by the queue's message store and only touched under the queue lock,
//! after expired deadlines have been fired for the operation's instant.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::core::timer::TimerWheel;
use crate::storage::MessageKey;

/// One delivery of an in-flight message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Epoch minted for this delivery.
    pub epoch: u64,
    /// When the message was received.
    pub received_at: Instant,
    /// When the message becomes visible again.
    pub deadline: Instant,
}

/// How a receipt epoch relates to a message's current delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// The epoch belongs to the armed delivery.
    Current(Delivery),
    /// The message is in flight under a newer delivery.
    Superseded,
    /// The message is not in flight.
    NotInFlight,
}

/// Per-queue visibility timer state.
#[derive(Debug, Default)]
pub struct VisibilityManager {
    timers: TimerWheel<MessageKey>,
    deliveries: HashMap<MessageKey, Delivery>,
}

impl VisibilityManager {
    /// Create a new visibility manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fresh delivery; any previous delivery of `key` is replaced.
    pub fn arm(&mut self, key: MessageKey, epoch: u64, received_at: Instant, deadline: Instant) {
        self.timers.arm(key, deadline);
        self.deliveries.insert(
            key,
            Delivery {
                epoch,
                received_at,
                deadline,
            },
        );
    }

    /// Move the current delivery's deadline. No-op if `key` is not in flight.
    pub fn rearm(&mut self, key: MessageKey, deadline: Instant) -> bool {
        match self.deliveries.get_mut(&key) {
            Some(delivery) => {
                delivery.deadline = deadline;
                self.timers.arm(key, deadline);
                true
            }
            None => false,
        }
    }

    /// Cancel the delivery of `key`.
    pub fn disarm(&mut self, key: MessageKey) -> Option<Delivery> {
        self.timers.disarm(&key);
        self.deliveries.remove(&key)
    }

    /// Classify `epoch` against the armed delivery of `key`.
    pub fn check(&self, key: MessageKey, epoch: u64) -> HandleStatus {
        match self.deliveries.get(&key) {
            Some(delivery) if delivery.epoch == epoch => HandleStatus::Current(*delivery),
            Some(_) => HandleStatus::Superseded,
            None => HandleStatus::NotInFlight,
        }
    }

    /// Fire every delivery due at or before `now`; returns the expired keys.
    pub fn fire_expired(&mut self, now: Instant) -> Vec<MessageKey> {
        self.timers
            .pop_expired(now)
            .into_iter()
            .map(|(key, _)| {
                self.deliveries.remove(&key);
                key
            })
            .collect()
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Number of in-flight deliveries.
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// Drop every delivery.
    pub fn clear(&mut self) {
        self.timers.clear();
        self.deliveries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_fire_returns_expired_only() {
        let now = Instant::now();
        let mut manager = VisibilityManager::new();
        manager.arm(MessageKey(1), 1, now, now + Duration::from_secs(30));
        manager.arm(MessageKey(2), 2, now, now + Duration::from_secs(60));

        assert!(manager.fire_expired(now + Duration::from_secs(29)).is_empty());
        assert_eq!(
            manager.fire_expired(now + Duration::from_secs(30)),
            vec![MessageKey(1)]
        );
        assert_eq!(manager.check(MessageKey(1), 1), HandleStatus::NotInFlight);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_is_absolute() {
        let now = Instant::now();
        let mut manager = VisibilityManager::new();
        manager.arm(MessageKey(1), 1, now, now + Duration::from_secs(30));

        assert!(manager.rearm(MessageKey(1), now + Duration::from_secs(5)));
        assert_eq!(manager.fire_expired(now + Duration::from_secs(5)), vec![MessageKey(1)]);
        assert!(!manager.rearm(MessageKey(1), now + Duration::from_secs(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_before_deadline_never_fires() {
        let now = Instant::now();
        let mut manager = VisibilityManager::new();
        manager.arm(MessageKey(3), 9, now, now + Duration::from_secs(1));

        assert!(manager.disarm(MessageKey(3)).is_some());
        assert!(manager.fire_expired(now + Duration::from_secs(10)).is_empty());
        assert!(manager.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_epoch() {
        let now = Instant::now();
        let mut manager = VisibilityManager::new();
        manager.arm(MessageKey(4), 1, now, now + Duration::from_secs(1));
        manager.arm(MessageKey(4), 2, now, now + Duration::from_secs(1));

        assert_eq!(manager.check(MessageKey(4), 1), HandleStatus::Superseded);
        assert!(matches!(manager.check(MessageKey(4), 2), HandleStatus::Current(d) if d.epoch == 2));
        assert_eq!(manager.len(), 1);
    }
}
