//! Shared cache of tuned physics weights
//!
//! Keys are coarse complexity buckets, never element identities, so two
//! structurally similar scenes share one entry. The map sits behind a
//! read-mostly lock; lookups take the read side and bump an atomic
//! last-used stamp, so concurrent scene workers only serialize on inserts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::layout::{ComplexityProfile, PhysicsParams};

/// Largest element-count bucket (`log2` of the count)
const MAX_COUNT_BUCKET: u32 = 12;
/// Largest density bucket (tenths of an element per unit area)
const MAX_DENSITY_BUCKET: u32 = 50;
/// Constraint counts above this share a bucket
const MAX_CONSTRAINT_BUCKET: u32 = 8;

/// Quantized summary of a layout problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComplexityBucket {
    pub count: u32,
    pub density: u32,
    pub overlap: u32,
    pub constraints: u32,
}

impl ComplexityBucket {
    pub fn from_profile(profile: &ComplexityProfile) -> Self {
        let count = (profile.element_count.max(1) as f64).log2().floor() as u32;
        let density = (profile.density * 10.0).round().max(0.0) as u32;
        let overlap = (profile.overlap_fraction.clamp(0.0, 1.0) * 10.0).floor() as u32;
        Self {
            count: count.min(MAX_COUNT_BUCKET),
            density: density.min(MAX_DENSITY_BUCKET),
            overlap,
            constraints: (profile.constraint_count as u32).min(MAX_CONSTRAINT_BUCKET),
        }
    }
}

/// Tuned weights with the loss they reached
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachedWeights {
    pub params: PhysicsParams,
    pub loss: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

struct Entry {
    weights: CachedWeights,
    last_used: AtomicU64,
}

struct Inner {
    entries: RwLock<HashMap<ComplexityBucket, Entry>>,
    capacity: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

/// Cloning yields another handle to the same cache
#[derive(Clone)]
pub struct WeightCache {
    inner: Arc<Inner>,
}

impl Default for WeightCache {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for WeightCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightCache").field("stats", &self.stats()).finish()
    }
}

impl WeightCache {
    /// A cache holding at most `capacity` buckets (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                capacity: capacity.max(1),
                clock: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                inserts: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    fn tick(&self) -> u64 {
        self.inner.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, bucket: &ComplexityBucket) -> Option<CachedWeights> {
        let entries = self.inner.entries.read();
        match entries.get(bucket) {
            Some(entry) => {
                entry.last_used.store(self.tick(), Ordering::Relaxed);
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(?bucket, "weight cache hit");
                Some(entry.weights)
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(?bucket, "weight cache miss");
                None
            }
        }
    }

    /// Store weights for `bucket`, evicting the least recently used entry
    /// when full. An existing entry is only replaced by a lower loss.
    pub fn insert(&self, bucket: ComplexityBucket, weights: CachedWeights) {
        let stamp = self.tick();
        let mut entries = self.inner.entries.write();

        if let Some(existing) = entries.get_mut(&bucket) {
            existing.last_used.store(stamp, Ordering::Relaxed);
            if weights.loss < existing.weights.loss {
                existing.weights = weights;
                self.inner.inserts.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }

        if entries.len() >= self.inner.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| *key);
            if let Some(key) = oldest {
                entries.remove(&key);
                self.inner.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(bucket = ?key, "weight cache evicted");
            }
        }

        entries.insert(
            bucket,
            Entry {
                weights,
                last_used: AtomicU64::new(stamp),
            },
        );
        self.inner.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn contains(&self, bucket: &ComplexityBucket) -> bool {
        self.inner.entries.read().contains_key(bucket)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Drop every entry; counters keep running
    pub fn clear(&self) {
        self.inner.entries.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            inserts: self.inner.inserts.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            entries: self.len(),
            capacity: self.inner.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::StrategyKind;

    fn bucket(count: u32) -> ComplexityBucket {
        ComplexityBucket {
            count,
            density: 1,
            overlap: 0,
            constraints: 0,
        }
    }

    fn weights(loss: f64) -> CachedWeights {
        CachedWeights {
            params: PhysicsParams::default(),
            loss,
        }
    }

    fn profile(element_count: usize, density: f64, overlap_fraction: f64) -> ComplexityProfile {
        ComplexityProfile {
            element_count,
            density,
            area_coverage: 0.1,
            overlap_fraction,
            overlap_area: 0.0,
            has_dependencies: false,
            constraint_count: 0,
            recommended: StrategyKind::ForceDirected,
            physics: PhysicsParams::default(),
        }
    }

    #[test]
    fn test_similar_profiles_share_a_bucket() {
        let a = ComplexityBucket::from_profile(&profile(20, 0.18, 0.31));
        let b = ComplexityBucket::from_profile(&profile(24, 0.21, 0.35));
        assert_eq!(a, b);
        let c = ComplexityBucket::from_profile(&profile(40, 0.18, 0.31));
        assert_ne!(a, c);
    }

    #[test]
    fn test_hits_and_misses_are_counted() {
        let cache = WeightCache::new(4);
        assert!(cache.get(&bucket(1)).is_none());
        cache.insert(bucket(1), weights(0.5));
        assert_eq!(cache.get(&bucket(1)), Some(weights(0.5)));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = WeightCache::new(2);
        cache.insert(bucket(1), weights(0.1));
        cache.insert(bucket(2), weights(0.2));
        // touch 1 so 2 becomes the oldest
        cache.get(&bucket(1));
        cache.insert(bucket(3), weights(0.3));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&bucket(1)));
        assert!(!cache.contains(&bucket(2)));
        assert!(cache.contains(&bucket(3)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_only_better_loss_replaces_entry() {
        let cache = WeightCache::new(2);
        cache.insert(bucket(1), weights(0.4));
        cache.insert(bucket(1), weights(0.9));
        assert_eq!(cache.get(&bucket(1)).map(|w| w.loss), Some(0.4));
        cache.insert(bucket(1), weights(0.1));
        assert_eq!(cache.get(&bucket(1)).map(|w| w.loss), Some(0.1));
    }

    #[test]
    fn test_clones_share_state() {
        let cache = WeightCache::default();
        let handle = cache.clone();
        handle.insert(bucket(5), weights(0.2));
        assert!(cache.contains(&bucket(5)));
        assert_eq!(cache.capacity(), 64);
    }
}
