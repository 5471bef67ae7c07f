//! Exclusive sections keyed by string
//!
//! Commands lock the keys of everything they read-then-write (the item, its
//! sibling family, transient subtree roots). Keys are always acquired in
//! sorted order so two commands sharing keys cannot deadlock.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// Key for the exclusive section of one work item
pub fn item_key(id: &str) -> String {
    format!("item:{}", id)
}

/// Key shared by an item and all of its children
pub fn family_key(id: &str) -> String {
    format!("family:{}", id)
}

/// Key for a materialized subtree
pub fn transient_key(root_path: &str) -> String {
    format!("transient:{}", root_path)
}

/// A set of held keys; released on drop
pub struct KeyedGuard {
    keys: BTreeSet<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyedGuard {
    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    /// True if every key in `wanted` is held
    pub fn covers(&self, wanted: &BTreeSet<String>) -> bool {
        wanted.is_subset(&self.keys)
    }
}

/// Registry of per-key mutexes
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key in `keys`, in sorted order
    pub async fn lock(&self, keys: BTreeSet<String>) -> KeyedGuard {
        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Entries nobody holds or waits on can go
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            keys.iter()
                .map(|k| locks.entry(k.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        trace!(?keys, "acquired exclusive section");

        KeyedGuard {
            keys,
            _guards: guards,
        }
    }

    /// Number of keys currently registered
    pub fn registered(&self) -> usize {
        match self.locks.lock() {
            Ok(locks) => locks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn keys(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.lock(keys(&["item:A"])).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(keys(&["item:A", "family:A"])).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(keys(&["item:A"])).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(keys(&["item:B"]))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyedLocks::new();
        drop(locks.lock(keys(&["item:A", "item:B"])).await);
        let _c = locks.lock(keys(&["item:C"])).await;
        assert_eq!(locks.registered(), 1);
    }

    #[test]
    fn test_guard_covers() {
        let wanted = keys(&["item:A"]);
        let guard = KeyedGuard {
            keys: keys(&["family:A", "item:A"]),
            _guards: Vec::new(),
        };
        assert!(guard.covers(&wanted));
        assert!(!guard.covers(&keys(&["transient:/review/A"])));
    }
}
