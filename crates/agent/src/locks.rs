//! Per-customer serialisation of cart mutations

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type CustomerKey = (String, String);

/// One async mutex per (tenant, customer).
///
/// A message holds its customer's lock for the whole load-decide-write step,
/// so two messages from the same customer never interleave their
/// read-modify-write. Different customers never contend.
#[derive(Default)]
pub struct CustomerLocks {
    locks: DashMap<CustomerKey, Arc<Mutex<()>>>,
}

impl CustomerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, tenant_id: &str, customer_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry((tenant_id.to_string(), customer_id.to_string()))
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drop entries nobody holds or waits on
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
