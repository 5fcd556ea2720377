//! Dynamic vector tiling for in-memory feature collections.
//!
//! This library answers one question: given a collection of geographic
//! features (points, lines, polygons in lon/lat), what geometry belongs in
//! map tile (z, x, y)? Tiles are computed lazily on first request — clipped
//! to the tile's buffered box and simplified to the tile's resolution — and
//! memoized under an LRU budget, so arbitrarily large collections can be
//! browsed at any zoom without precomputing every tile.
//!
//! Parsing (shapefile/GeoJSON → [`FeatureCollection`]) and rendering are the
//! caller's concern; the engine consumes a validated collection and produces
//! [`Tile`] values with coordinates in tile-local pixel space.
//!
//! # Example
//!
//! ```
//! use vectile::{Feature, FeatureCollection, Tiler, TilerOptions};
//! use geo::{polygon, Geometry};
//!
//! let square = Feature::new(Geometry::Polygon(polygon![
//!     (x: 0.0, y: 0.0),
//!     (x: 1.0, y: 0.0),
//!     (x: 1.0, y: 1.0),
//!     (x: 0.0, y: 1.0),
//!     (x: 0.0, y: 0.0),
//! ]));
//!
//! let tiler = Tiler::new();
//! let session = tiler
//!     .load(FeatureCollection::new(vec![square]), TilerOptions::default())
//!     .unwrap();
//!
//! let tile = session.tile(0, 0, 0).unwrap();
//! assert_eq!(tile.features.len(), 1);
//! ```

use thiserror::Error;

pub mod cache;
pub mod clip;
pub mod geometry;
pub mod project;
pub mod session;
pub mod simplify;
pub mod tile;

pub use cache::CacheStats;
pub use geometry::{Feature, FeatureCollection, Properties};
pub use project::LngLatBounds;
pub use session::{Session, Tiler, TilerOptions};
pub use tile::{Tile, TileAddress, TileFeature};

/// Errors surfaced by the tiling engine.
///
/// Numeric degeneracies (zero-area rings, coordinates collapsing under the
/// latitude clamp) are not errors; they resolve to empty contributions.
#[derive(Error, Debug)]
pub enum Error {
    /// A feature failed ingestion validation. The collection load aborts
    /// entirely; callers see one consistent collection or none.
    #[error("malformed geometry at feature {feature_index}: {reason}")]
    MalformedGeometry {
        feature_index: usize,
        reason: String,
    },

    /// A tile address outside the configured zoom range or the x/y domain
    /// for its zoom. Recoverable: retry with a valid address.
    #[error("tile address z{z}/x{x}/y{y} is outside the configured domain")]
    OutOfRange { z: u8, x: u32, y: u32 },

    /// The session was disposed or superseded by a later `load`.
    /// Recoverable: re-load the collection.
    #[error("session is closed")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
