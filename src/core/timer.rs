//! Keyed deadline wheel.
//!
//! Each key has at most one armed deadline. Arming an armed key replaces its
//! deadline; expired entries are popped in deadline order by whoever owns the
//! wheel, under the same lock that guards the state the timers act on.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use tokio::time::Instant;

/// Deadline wheel keyed by `K`.
#[derive(Debug)]
pub struct TimerWheel<K> {
    deadlines: HashMap<K, Instant>,
    order: BTreeSet<(Instant, K)>,
}

impl<K> TimerWheel<K>
where
    K: Ord + Hash + Clone,
{
    /// Empty wheel.
    pub fn new() -> Self {
        Self {
            deadlines: HashMap::new(),
            order: BTreeSet::new(),
        }
    }

    /// Arm `key` at `deadline`, replacing any previous deadline.
    ///
    /// Returns the replaced deadline.
    pub fn arm(&mut self, key: K, deadline: Instant) -> Option<Instant> {
        let previous = self.disarm(&key);
        self.order.insert((deadline, key.clone()));
        self.deadlines.insert(key, deadline);
        previous
    }

    /// Cancel `key`. Returns its deadline if it was armed.
    pub fn disarm(&mut self, key: &K) -> Option<Instant> {
        let deadline = self.deadlines.remove(key)?;
        self.order.remove(&(deadline, key.clone()));
        Some(deadline)
    }

    /// Deadline of `key`, if armed.
    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.deadlines.get(key).copied()
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.order.first().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every entry due at or before `now`, earliest first.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<(K, Instant)> {
        let mut fired = Vec::new();
        while let Some((deadline, _)) = self.order.first() {
            if *deadline > now {
                break;
            }
            if let Some((deadline, key)) = self.order.pop_first() {
                self.deadlines.remove(&key);
                fired.push((key, deadline));
            }
        }
        fired
    }

    /// Number of armed keys.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Whether nothing is armed.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Disarm everything.
    pub fn clear(&mut self) {
        self.deadlines.clear();
        self.order.clear();
    }
}

impl<K> Default for TimerWheel<K>
where
    K: Ord + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
