//! Single-flight memoizing map.
//!
//! Concurrent misses on the same key share one in-flight computation; the
//! first successful value is stored for the lifetime of the map and never
//! overwritten. A failed computation stores nothing, so the next caller
//! retries.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;

/// Thread-safe memoizing map with per-key single-flight fills
pub struct SingleFlight<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<OnceCell<V>>>> {
        // A poisoned lock still holds a consistent map
        self.cells.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cell(&self, key: &K) -> Arc<OnceCell<V>> {
        let mut cells = self.lock();
        Arc::clone(cells.entry(key.clone()).or_default())
    }

    /// Return the stored value for `key`, running `init` on a miss.
    ///
    /// Callers arriving while `init` is running wait for it instead of
    /// starting their own.
    pub async fn get_or_try_init<E, F, Fut>(&self, key: &K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.cell(key);
        cell.get_or_try_init(init).await.cloned()
    }

    /// Stored value for `key`, if a fill has completed
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of completed entries
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every completed value
    pub fn drain(&self) -> Vec<(K, V)> {
        self.lock()
            .drain()
            .filter_map(|(key, cell)| cell.get().cloned().map(|value| (key, value)))
            .collect()
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
