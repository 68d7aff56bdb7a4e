//! Session-scoped memoization.
//!
//! Entries live until [`MemoCache::clear`]; there is no eviction within a session.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

/// Key/value memo table consulted before any outbound model call.
#[derive(Debug)]
pub struct MemoCache<K, V> {
    entries: HashMap<K, V>,
    hits: u64,
}

impl<K, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_compute<F>(&mut self, key: K, compute: F) -> &V
    where
        F: FnOnce() -> V,
    {
        if self.entries.contains_key(&key) {
            self.hits += 1;
        }
        self.entries.entry(key).or_insert_with(compute)
    }

    /// Fallible variant of [`MemoCache::get_or_compute`]; errors are not cached.
    pub fn get_or_try_insert_with<F, E>(&mut self, key: K, compute: F) -> Result<&V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if self.entries.contains_key(&key) {
            self.hits += 1;
        }
        match self.entries.entry(key) {
            std::collections::hash_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            std::collections::hash_map::Entry::Vacant(entry) => Ok(entry.insert(compute()?)),
        }
    }

    /// Fallible, asynchronous variant of [`MemoCache::get_or_compute`].
    ///
    /// Errors are returned to the caller and never cached, so the next call retries.
    pub async fn get_or_try_compute<F, Fut, E>(&mut self, key: K, compute: F) -> Result<V, E>
    where
        V: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_try_compute_if(key, compute, |_| true).await
    }

    /// Like [`MemoCache::get_or_try_compute`], but a computed value is only stored when `keep`
    /// accepts it. Rejected values are still returned.
    pub async fn get_or_try_compute_if<F, Fut, E, P>(
        &mut self,
        key: K,
        compute: F,
        keep: P,
    ) -> Result<V, E>
    where
        V: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        P: FnOnce(&V) -> bool,
    {
        if let Some(value) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(value.clone());
        }
        let value = compute().await?;
        if keep(&value) {
            self.entries.insert(key, value.clone());
        }
        Ok(value)
    }

    /// Peek at a cached value without computing.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry; called when the session is cleared.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Deterministic content key over an ordered list of parts.
///
/// Parts are length-prefixed so `("ab", "c")` and `("a", "bc")` never collide.
pub fn content_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_compute_runs_closure_once() {
        let mut cache = MemoCache::new();
        let mut calls = 0;
        assert_eq!(
            *cache.get_or_compute("a", || {
                calls += 1;
                1
            }),
            1
        );
        assert_eq!(*cache.get_or_compute("a", || 2), 1);
        assert_eq!(calls, 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn sync_failures_are_not_cached() {
        let mut cache: MemoCache<&str, usize> = MemoCache::new();
        assert_eq!(cache.get_or_try_insert_with("k", || Err("bad")), Err("bad"));
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_try_insert_with("k", || Ok::<_, &str>(7)), Ok(&7));
        assert_eq!(cache.get_or_try_insert_with("k", || Err("unused")), Ok(&7));
        assert_eq!(cache.hits(), 1);
    }

    #[tokio::test]
    async fn failed_computations_are_not_cached() {
        let mut cache: MemoCache<&str, String> = MemoCache::new();
        let error = cache
            .get_or_try_compute("k", || async { Err::<String, _>("down") })
            .await
            .expect_err("first call fails");
        assert_eq!(error, "down");
        assert!(cache.is_empty());

        let value = cache
            .get_or_try_compute("k", || async { Ok::<_, &str>("up".to_string()) })
            .await
            .expect("second call computes");
        assert_eq!(value, "up");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn rejected_values_are_returned_but_not_stored() {
        let mut cache: MemoCache<&str, u32> = MemoCache::new();
        let odd = |value: &u32| value % 2 == 1;

        let value = cache
            .get_or_try_compute_if("k", || async { Ok::<_, ()>(4) }, odd)
            .await
            .expect("computes");
        assert_eq!(value, 4);
        assert!(cache.is_empty());

        let value = cache
            .get_or_try_compute_if("k", || async { Ok::<_, ()>(5) }, odd)
            .await
            .expect("computes");
        assert_eq!(value, 5);
        assert_eq!(cache.get(&"k"), Some(&5));
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn content_key_is_deterministic_and_boundary_aware() {
        assert_eq!(content_key(&["a", "b"]), content_key(&["a", "b"]));
        assert_ne!(content_key(&["ab", "c"]), content_key(&["a", "bc"]));
        assert_eq!(content_key(&["x"]).len(), 64);
    }
}
