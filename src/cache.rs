//! In-memory tile cache with LRU eviction.
//!
//! Memoizes computed tiles by address, bounded by a tile-count budget.
//! Recency is a monotonic sequence number stamped on every hit and insert;
//! eviction removes the stalest entries. Tiles are stored and returned as
//! `Arc<Tile>`, so an evicted tile already handed to a caller stays valid —
//! eviction only drops the cache's reference.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;

use crate::tile::{Tile, TileAddress};

/// Default cache budget, in tiles.
pub const DEFAULT_MAX_TILES: usize = 512;

#[derive(Debug)]
struct CacheEntry {
    tile: Arc<Tile>,
    last_used: u64,
}

/// Counters describing cache behavior since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

struct CacheInner {
    entries: HashMap<TileAddress, CacheEntry>,
    clock: u64,
    stats: CacheStats,
}

/// LRU cache of computed tiles, keyed by address.
///
/// All operations take one short-lived lock; tile computation happens
/// entirely outside the cache, so requests for distinct addresses never
/// serialize on each other's geometry work.
pub struct TileCache {
    inner: Mutex<CacheInner>,
    max_tiles: usize,
}

impl TileCache {
    pub fn new(max_tiles: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                clock: 0,
                stats: CacheStats::default(),
            }),
            max_tiles: max_tiles.max(1),
        }
    }

    /// Look up a tile, refreshing its recency on a hit.
    pub fn get(&self, address: &TileAddress) -> Option<Arc<Tile>> {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;

        if let Some(entry) = inner.entries.get_mut(address) {
            entry.last_used = clock;
            let tile = Arc::clone(&entry.tile);
            inner.stats.hits += 1;
            Some(tile)
        } else {
            inner.stats.misses += 1;
            None
        }
    }

    /// Store a computed tile, evicting least-recently-used entries if the
    /// budget is exceeded. Concurrent computations of the same address
    /// overwrite each other; last writer wins.
    pub fn insert(&self, address: TileAddress, tile: Arc<Tile>) {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;
        inner.entries.insert(
            address,
            CacheEntry {
                tile,
                last_used: clock,
            },
        );

        while inner.entries.len() > self.max_tiles {
            let stalest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(addr, _)| *addr);
            match stalest {
                Some(addr) => {
                    inner.entries.remove(&addr);
                    inner.stats.evictions += 1;
                    log::trace!("evicted tile {} from cache", addr);
                }
                None => break,
            }
        }
    }

    pub fn contains(&self, address: &TileAddress) -> bool {
        self.inner.lock().unwrap().entries.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Tiles already handed out remain valid.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(z: u8, x: u32, y: u32) -> (TileAddress, Arc<Tile>) {
        let address = TileAddress::new(z, x, y);
        (address, Arc::new(Tile::empty(address, 4096)))
    }

    #[test]
    fn test_insert_and_get() {
        let cache = TileCache::new(8);
        let (addr, t) = tile(3, 1, 2);

        assert!(cache.get(&addr).is_none());
        cache.insert(addr, t);
        assert!(cache.get(&addr).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction_order() {
        let cache = TileCache::new(2);
        let (a, ta) = tile(1, 0, 0);
        let (b, tb) = tile(1, 0, 1);
        let (c, tc) = tile(1, 1, 0);

        cache.insert(a, ta);
        cache.insert(b, tb);
        cache.insert(c, tc);

        assert!(!cache.contains(&a), "oldest entry should be evicted");
        assert!(cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = TileCache::new(2);
        let (a, ta) = tile(1, 0, 0);
        let (b, tb) = tile(1, 0, 1);
        let (c, tc) = tile(1, 1, 0);

        cache.insert(a, ta);
        cache.insert(b, tb);
        cache.get(&a); // a is now fresher than b
        cache.insert(c, tc);

        assert!(cache.contains(&a), "recently read entry should survive");
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_evicted_tile_stays_usable() {
        let cache = TileCache::new(1);
        let (a, ta) = tile(5, 10, 10);
        let (b, tb) = tile(5, 11, 10);

        cache.insert(a, ta);
        let held = cache.get(&a).unwrap();
        cache.insert(b, tb); // evicts a

        assert!(!cache.contains(&a));
        assert_eq!(held.address, a);
        assert_eq!(held.extent, 4096);
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = TileCache::new(8);
        let (a, ta) = tile(2, 1, 1);
        cache.insert(a, ta);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_track_hits_misses_evictions() {
        let cache = TileCache::new(1);
        let (a, ta) = tile(1, 0, 0);
        let (b, tb) = tile(1, 0, 1);

        cache.get(&a);
        cache.insert(a, ta);
        cache.get(&a);
        cache.insert(b, tb);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_insert_same_address_replaces() {
        let cache = TileCache::new(4);
        let (a, ta) = tile(1, 0, 0);
        let replacement = Arc::new(Tile::empty(a, 256));

        cache.insert(a, ta);
        cache.insert(a, replacement);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&a).unwrap().extent, 256);
    }
}
