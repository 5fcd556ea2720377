//! The public tiling surface: `Tiler`, `Session`, and `TilerOptions`.
//!
//! A `Tiler` owns at most one live dataset. `load` validates and projects a
//! feature collection, builds the spatial index, and returns a `Session`
//! handle; loading again (or calling `dispose`) closes the previous session,
//! releasing its cache and projected state. Sessions are cheap to clone and
//! safe to share across threads: tile computation happens outside every
//! lock, so requests for distinct addresses run concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use geo::{BoundingRect, Geometry};
use rstar::{RTree, RTreeObject, AABB};

use crate::cache::{CacheStats, TileCache, DEFAULT_MAX_TILES};
use crate::clip::clip_geometry;
use crate::geometry::{validate_collection, FeatureCollection, Properties};
use crate::project::{project_geometry, LngLatBounds};
use crate::simplify::{simplify_for_zoom, DEFAULT_TOLERANCE_PX};
use crate::tile::{to_local, Tile, TileAddress, TileFeature, WorldBox, MAX_ZOOM};
use crate::{Error, Result};

/// Tiling options, with builder-style setters.
#[derive(Debug, Clone)]
pub struct TilerOptions {
    /// Lowest zoom level served.
    pub min_zoom: u8,
    /// Highest zoom level served.
    pub max_zoom: u8,
    /// Clip buffer as a fraction of tile span. The default matches the
    /// customary 64 pixels on a 4096-pixel tile.
    pub buffer_ratio: f64,
    /// Simplification error budget in tile-local pixels.
    pub tolerance_px: f64,
    /// Tile extent in local pixels.
    pub extent: u32,
    /// LRU cache budget, in tiles.
    pub max_cache_tiles: usize,
}

impl Default for TilerOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 14,
            buffer_ratio: 64.0 / 4096.0,
            tolerance_px: DEFAULT_TOLERANCE_PX,
            extent: 4096,
            max_cache_tiles: DEFAULT_MAX_TILES,
        }
    }
}

impl TilerOptions {
    pub fn new(min_zoom: u8, max_zoom: u8) -> Self {
        Self {
            min_zoom,
            max_zoom,
            ..Default::default()
        }
    }

    pub fn with_buffer_ratio(mut self, buffer_ratio: f64) -> Self {
        self.buffer_ratio = buffer_ratio;
        self
    }

    pub fn with_tolerance_px(mut self, tolerance_px: f64) -> Self {
        self.tolerance_px = tolerance_px;
        self
    }

    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_max_cache_tiles(mut self, max_cache_tiles: usize) -> Self {
        self.max_cache_tiles = max_cache_tiles;
        self
    }
}

/// A feature after ingestion: projected geometry, its bounding box, and the
/// shared properties. Immutable for the session's lifetime.
struct PreparedFeature {
    geometry: Geometry<f64>,
    bbox: WorldBox,
    properties: Arc<Properties>,
}

/// R-tree leaf: a feature's bounding box, tied back to the feature by index
/// so results can be replayed in original collection order.
struct FeatureEnvelope {
    index: usize,
    bbox: WorldBox,
}

impl RTreeObject for FeatureEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_x, self.bbox.min_y],
            [self.bbox.max_x, self.bbox.max_y],
        )
    }
}

struct SessionState {
    features: Vec<PreparedFeature>,
    index: RTree<FeatureEnvelope>,
    cache: TileCache,
    /// Simplified geometry per (feature index, zoom); `None` records that
    /// the feature degenerates entirely at that zoom.
    simplified: RwLock<HashMap<(usize, u8), Option<Arc<Geometry<f64>>>>>,
    bounds: Option<LngLatBounds>,
    options: TilerOptions,
    closed: AtomicBool,
}

impl SessionState {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.cache.clear();
        self.simplified.write().unwrap().clear();
        log::debug!("session closed, derived state released");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Simplified geometry for one feature at one zoom, memoized across all
    /// tiles of that zoom. Concurrent first requests may both compute; the
    /// last writer wins, which is harmless because the inputs are identical.
    fn simplified_at(&self, index: usize, zoom: u8) -> Option<Arc<Geometry<f64>>> {
        let key = (index, zoom);
        if let Some(cached) = self.simplified.read().unwrap().get(&key) {
            return cached.clone();
        }

        let result = simplify_for_zoom(
            &self.features[index].geometry,
            zoom,
            self.options.extent,
            self.options.tolerance_px,
        )
        .map(Arc::new);

        self.simplified
            .write()
            .unwrap()
            .insert(key, result.clone());
        result
    }

    /// Compute one tile from scratch: query the index, then simplify and
    /// clip each candidate, preserving original feature order.
    fn compute_tile(&self, address: TileAddress) -> Tile {
        let tile_box = address.world_box();
        let clip_box = tile_box.buffered(self.options.buffer_ratio * address.span());

        let mut candidates: Vec<usize> = self
            .index
            .locate_in_envelope_intersecting(&AABB::from_corners(
                [clip_box.min_x, clip_box.min_y],
                [clip_box.max_x, clip_box.max_y],
            ))
            .map(|envelope| envelope.index)
            .collect();
        // R-tree results are unordered; paint order must be stable.
        candidates.sort_unstable();

        let mut features = Vec::new();
        for index in candidates {
            let Some(simplified) = self.simplified_at(index, address.z) else {
                continue;
            };
            let Some(clipped) = clip_geometry(&simplified, &clip_box) else {
                continue;
            };
            features.push(TileFeature {
                geometry: to_local(&clipped, &address, self.options.extent),
                properties: Arc::clone(&self.features[index].properties),
            });
        }

        log::trace!("computed tile {} with {} features", address, features.len());

        Tile {
            address,
            extent: self.options.extent,
            features,
        }
    }
}

/// The engine's entry point. Owns the currently loaded session, treating
/// `load` as a replacement barrier: a new load closes the old session.
#[derive(Default)]
pub struct Tiler {
    current: Mutex<Option<Arc<SessionState>>>,
}

impl Tiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, project, and index a collection, replacing any session
    /// previously loaded through this tiler.
    ///
    /// Fails with [`Error::MalformedGeometry`] on the first invalid feature;
    /// nothing is loaded in that case and any prior session stays live.
    pub fn load(
        &self,
        mut collection: FeatureCollection,
        options: TilerOptions,
    ) -> Result<Session> {
        validate_collection(&mut collection)?;

        let mut options = options;
        // Columns and rows are u32; zooms past MAX_ZOOM are unaddressable.
        options.max_zoom = options.max_zoom.min(MAX_ZOOM);

        let mut world_bounds = WorldBox::empty();
        let mut features = Vec::with_capacity(collection.len());
        for feature in collection.0 {
            let geometry = project_geometry(&feature.geometry);
            // Validation guarantees non-empty geometry, so a bounding rect
            // always exists; an empty one contributes nothing.
            let Some(rect) = geometry.bounding_rect() else {
                continue;
            };
            let bbox = WorldBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);
            world_bounds.expand(&bbox);
            features.push(PreparedFeature {
                geometry,
                bbox,
                properties: Arc::new(feature.properties),
            });
        }

        let index = RTree::bulk_load(
            features
                .iter()
                .enumerate()
                .map(|(index, feature)| FeatureEnvelope {
                    index,
                    bbox: feature.bbox,
                })
                .collect(),
        );

        let bounds = world_bounds.is_valid().then(|| {
            LngLatBounds::from_world(
                geo::Coord {
                    x: world_bounds.min_x,
                    y: world_bounds.min_y,
                },
                geo::Coord {
                    x: world_bounds.max_x,
                    y: world_bounds.max_y,
                },
            )
        });

        log::debug!(
            "loaded {} features, zoom {}..={}, bounds {:?}",
            features.len(),
            options.min_zoom,
            options.max_zoom,
            bounds
        );

        let state = Arc::new(SessionState {
            features,
            index,
            cache: TileCache::new(options.max_cache_tiles),
            simplified: RwLock::new(HashMap::new()),
            bounds,
            options,
            closed: AtomicBool::new(false),
        });

        let previous = self
            .current
            .lock()
            .unwrap()
            .replace(Arc::clone(&state));
        if let Some(old) = previous {
            old.close();
        }

        Ok(Session { state })
    }
}

/// A handle to one loaded dataset. Clones share the same underlying state.
#[derive(Clone)]
pub struct Session {
    state: Arc<SessionState>,
}

impl Session {
    /// The geometry belonging to tile (z, x, y), clipped to the buffered
    /// tile box and simplified for zoom z, with coordinates in the tile's
    /// local pixel space.
    ///
    /// Results are memoized; repeated calls for the same address on an
    /// unchanged session return coordinate-identical tiles.
    pub fn tile(&self, z: u8, x: u32, y: u32) -> Result<Arc<Tile>> {
        self.ensure_open()?;

        let options = &self.state.options;
        let address = TileAddress::new(z, x, y);
        if z < options.min_zoom || z > options.max_zoom || !address.in_grid() {
            return Err(Error::OutOfRange { z, x, y });
        }

        if let Some(tile) = self.state.cache.get(&address) {
            return Ok(tile);
        }

        let tile = Arc::new(self.state.compute_tile(address));

        // A session superseded mid-computation must not repopulate its
        // cleared cache; the stale result itself is still fine to return.
        if !self.state.is_closed() {
            self.state.cache.insert(address, Arc::clone(&tile));
        }

        Ok(tile)
    }

    /// The minimal geographic box covering the collection, computed once at
    /// load time. `None` for an empty collection.
    pub fn bounds(&self) -> Result<Option<LngLatBounds>> {
        self.ensure_open()?;
        Ok(self.state.bounds)
    }

    /// Close the session, releasing the tile cache and simplification memo.
    /// Subsequent calls fail with [`Error::SessionClosed`]; tiles already
    /// returned remain valid.
    pub fn dispose(&self) {
        self.state.close();
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Number of features in the loaded collection.
    pub fn feature_count(&self) -> usize {
        self.state.features.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state.cache.stats()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.is_closed() {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }
}
