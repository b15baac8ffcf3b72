//! Per-target mutual exclusion
//!
//! One keyed lock table serializes every mutation path that touches the same
//! target entity. The dispatcher and the plan apply phase share a table, so
//! a confirmed plan cannot interleave with a direct edit of a function it is
//! about to rewrite or delete.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct TargetLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key. Keys are sorted and deduplicated first, so two
    /// acquisitions over overlapping sets always lock in the same order.
    pub async fn acquire(self: &Arc<Self>, keys: &[String]) -> TargetGuards {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            let lock = self
                .locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push(lock.lock_owned().await);
        }
        TargetGuards {
            table: self.clone(),
            keys,
            guards,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Guards for one acquisition. Dropping releases the keys and evicts table
/// entries nobody else holds or is waiting on, so the table does not grow
/// with every key ever locked.
pub struct TargetGuards {
    table: Arc<TargetLocks>,
    keys: Vec<String>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for TargetGuards {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            // A waiter holds its own clone of the Arc, keeping the count
            // above one until it acquires, so contended entries survive.
            self.table
                .locks
                .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}
