//! Bounded LRU cache mapping a block's physical (compressed) start offset to its decoded payload
//! and raw compressed length. Interposed between the [`super::cursor::Cursor`] and the block
//! codec so sequential and random-access re-reads of the same block skip re-inflating it.
//!
//! The teacher crate has no cache of its own (it decodes each block exactly once, in file order),
//! so this module is grounded directly on spec §4.3: a hash map for O(1) lookup plus an explicit
//! recency list for O(1) promote/evict, rather than pulling in an external LRU crate for a
//! contract this small and exactly specified.

use std::collections::HashMap;

use crate::error::{BamError, Result};

/// One cached block: its decoded payload and the number of compressed bytes it occupied on disk.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: std::sync::Arc<[u8]>,
    pub raw_length: u64,
}

/// A bounded, strictly-LRU cache keyed by a block's compressed start offset.
pub struct BlockCache {
    capacity: usize,
    entries: HashMap<u64, CacheEntry>,
    /// Recency order, oldest first. `recency.last()` is the most-recently-used key. Kept as a
    /// plain `Vec` rather than an intrusive linked list: capacities used in practice (tens to low
    /// hundreds of blocks) make the O(n) removal-on-promote cost irrelevant, and it avoids unsafe
    /// code entirely.
    recency: Vec<u64>,
}

impl BlockCache {
    /// Creates a cache holding at most `capacity` blocks. Rejects `capacity == 0`.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BamError::DomainError(
                "block cache capacity must be at least 1".to_string(),
            ));
        }
        Ok(BlockCache {
            capacity,
            entries: HashMap::with_capacity(capacity),
            recency: Vec::with_capacity(capacity),
        })
    }

    pub fn contains(&self, coffset: u64) -> bool {
        self.entries.contains_key(&coffset)
    }

    /// Looks up `coffset`, promoting it to most-recently-used on a hit.
    pub fn get(&mut self, coffset: u64) -> Option<CacheEntry> {
        if let Some(entry) = self.entries.get(&coffset).cloned() {
            self.touch(coffset);
            Some(entry)
        } else {
            None
        }
    }

    /// Inserts or updates `coffset`, promoting it to most-recently-used. Evicts the
    /// least-recently-used entry first if the cache is full and `coffset` is not already present.
    pub fn put(&mut self, coffset: u64, payload: std::sync::Arc<[u8]>, raw_length: u64) {
        if !self.entries.contains_key(&coffset) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.entries.insert(
            coffset,
            CacheEntry {
                payload,
                raw_length,
            },
        );
        self.touch(coffset);
    }

    fn touch(&mut self, coffset: u64) {
        if let Some(pos) = self.recency.iter().position(|&k| k == coffset) {
            self.recency.remove(pos);
        }
        self.recency.push(coffset);
    }

    fn evict_lru(&mut self) {
        if !self.recency.is_empty() {
            let lru = self.recency.remove(0);
            self.entries.remove(&lru);
        }
    }

    #[cfg(test)]
    fn keys_oldest_first(&self) -> Vec<u64> {
        self.recency.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(b: u8) -> std::sync::Arc<[u8]> {
        std::sync::Arc::from(vec![b])
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(BlockCache::new(0), Err(BamError::DomainError(_))));
    }

    #[test]
    fn get_miss_returns_none() {
        let mut cache = BlockCache::new(2).unwrap();
        assert!(cache.get(42).is_none());
        assert!(!cache.contains(42));
    }

    #[test]
    fn put_then_get_hits() {
        let mut cache = BlockCache::new(2).unwrap();
        cache.put(10, entry(1), 100);
        let got = cache.get(10).unwrap();
        assert_eq!(&*got.payload, &[1][..]);
        assert_eq!(got.raw_length, 100);
    }

    #[test]
    fn eviction_is_strictly_lru() {
        // capacity 3, access sequence 1,2,3,4 (miss),1(hit, promotes),5(miss, evicts LRU)
        let mut cache = BlockCache::new(3).unwrap();
        cache.put(1, entry(1), 1);
        cache.put(2, entry(2), 1);
        cache.put(3, entry(3), 1);
        assert_eq!(cache.keys_oldest_first(), vec![1, 2, 3]);

        cache.put(4, entry(4), 1); // evicts 1 (LRU)
        assert!(!cache.contains(1));
        assert_eq!(cache.keys_oldest_first(), vec![2, 3, 4]);

        // touch 2 so it's no longer the LRU
        assert!(cache.get(2).is_some());
        assert_eq!(cache.keys_oldest_first(), vec![3, 4, 2]);

        cache.put(5, entry(5), 1); // evicts 3 (now LRU)
        assert!(!cache.contains(3));
        assert_eq!(cache.keys_oldest_first(), vec![4, 2, 5]);
    }

    #[test]
    fn contents_equal_last_k_distinct_keys() {
        // property: for capacity k and access sequence a_1..a_m, cache contents == last k
        // distinct keys in the sequence.
        let sequence = [1u64, 2, 3, 2, 4, 1, 5, 5, 6];
        let k = 3;
        let mut cache = BlockCache::new(k).unwrap();
        for &key in &sequence {
            if cache.get(key).is_none() {
                cache.put(key, entry(key as u8), 1);
            }
        }

        // compute expected: walk sequence in reverse, collect first-seen keys until k distinct
        let mut expected = Vec::new();
        for &key in sequence.iter().rev() {
            if !expected.contains(&key) {
                expected.push(key);
            }
            if expected.len() == k {
                break;
            }
        }
        let mut got: Vec<u64> = cache.keys_oldest_first();
        got.sort_unstable();
        expected.sort_unstable();
        assert_eq!(got, expected);
    }

    #[test]
    fn updating_present_key_promotes_without_growing() {
        let mut cache = BlockCache::new(2).unwrap();
        cache.put(1, entry(1), 1);
        cache.put(2, entry(2), 1);
        cache.put(1, entry(9), 42); // update, not a new insert
        assert_eq!(cache.keys_oldest_first(), vec![2, 1]);
        let updated = cache.get(1).unwrap();
        assert_eq!(&*updated.payload, &[9][..]);
        assert_eq!(updated.raw_length, 42);
    }
}
