//! Duplicate webhook delivery guard

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Entries kept before a delivery check also sweeps expired ids
const SWEEP_THRESHOLD: usize = 10_000;

/// Remembers gateway message ids for a fixed window.
///
/// Ids are scoped by the receiving number since gateways only promise
/// uniqueness per device. A zero TTL disables the guard.
pub struct MessageDedup {
    seen: DashMap<String, Instant>,
    ttl: Duration,
}

impl MessageDedup {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            ttl,
        }
    }

    /// Record a delivery; `false` when the same id was seen within the TTL
    pub fn first_delivery(&self, recipient: &str, message_id: &str) -> bool {
        if self.ttl.is_zero() {
            return true;
        }
        if self.seen.len() > SWEEP_THRESHOLD {
            self.purge_expired();
        }

        let now = Instant::now();
        match self.seen.entry(format!("{}:{}", recipient, message_id)) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.ttl {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.seen.retain(|_, seen_at| seen_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_within_ttl_is_duplicate() {
        let dedup = MessageDedup::new(Duration::from_secs(60));
        assert!(dedup.first_delivery("62811", "m1"));
        assert!(!dedup.first_delivery("62811", "m1"));
        assert!(dedup.first_delivery("62811", "m2"));
    }

    #[test]
    fn test_ids_are_scoped_by_recipient() {
        let dedup = MessageDedup::new(Duration::from_secs(60));
        assert!(dedup.first_delivery("62811", "m1"));
        assert!(dedup.first_delivery("62822", "m1"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_expired_ids_are_accepted_again() {
        let dedup = MessageDedup::new(Duration::from_millis(10));
        assert!(dedup.first_delivery("62811", "m1"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(dedup.first_delivery("62811", "m1"));

        std::thread::sleep(Duration::from_millis(20));
        dedup.purge_expired();
        assert!(dedup.is_empty());
    }

    #[test]
    fn test_zero_ttl_disables_guard() {
        let dedup = MessageDedup::new(Duration::ZERO);
        assert!(dedup.first_delivery("62811", "m1"));
        assert!(dedup.first_delivery("62811", "m1"));
        assert!(dedup.is_empty());
    }
}
