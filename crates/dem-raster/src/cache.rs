//! Bounded tiles cache with least-recently-used eviction.

use crate::tile::{normalize_longitude, Location, Tile, UpdatableTile};
use crate::zipper;
use crate::{DemError, Result};
use std::f64::consts::PI;
use std::rc::Rc;
use tracing::{debug, trace};

/// Builder of empty tiles.
///
/// Any `Fn() -> T` closure is a factory, so `|| SimpleTile::new()` or
/// `SimpleTile::new` can be passed directly to a cache.
pub trait TileFactory<T> {
    /// Create a new, uninitialized tile.
    fn create_tile(&self) -> T;
}

impl<T, F> TileFactory<T> for F
where
    F: Fn() -> T,
{
    fn create_tile(&self) -> T {
        self()
    }
}

/// Source of elevation data.
///
/// The updater must configure the tile so that the point `(latitude,
/// longitude)` (radians) lies within the tile nominal area, i.e. either has
/// interpolation neighbors or falls in the half-cell skirt around the
/// outermost samples. It is called at most once per tile.
pub trait TileUpdater {
    /// Set the geometry and all the elevation samples of `tile`.
    fn update_tile(&mut self, latitude: f64, longitude: f64, tile: &mut dyn UpdatableTile) -> Result<()>;
}

impl<U: TileUpdater + ?Sized> TileUpdater for Box<U> {
    fn update_tile(&mut self, latitude: f64, longitude: f64, tile: &mut dyn UpdatableTile) -> Result<()> {
        (**self).update_tile(latitude, longitude, tile)
    }
}

/// Window into which longitudes are normalized before calling the updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LongitudeRange {
    /// `(-π, π]`
    #[default]
    Signed,
    /// `[0, 2π)`
    Positive,
}

impl LongitudeRange {
    /// Normalize a longitude into the window.
    pub fn normalize(self, longitude: f64) -> f64 {
        match self {
            LongitudeRange::Signed => {
                let normalized = normalize_longitude(longitude, 0.0);
                if normalized <= -PI {
                    normalized + 2.0 * PI
                } else {
                    normalized
                }
            }
            LongitudeRange::Positive => normalize_longitude(longitude, PI),
        }
    }
}

/// Default maximum number of resident tiles.
pub const DEFAULT_MAX_TILES: usize = 8;

/// Configuration of a [`TilesCache`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TilesCacheConfig {
    /// Maximum number of resident tiles, zipper tiles included.
    pub max_tiles: usize,
    /// Longitude window used for updater queries.
    pub longitude_range: LongitudeRange,
}

impl Default for TilesCacheConfig {
    fn default() -> Self {
        Self {
            max_tiles: DEFAULT_MAX_TILES,
            longitude_range: LongitudeRange::default(),
        }
    }
}

/// Counters describing the cache activity since its creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Tiles loaded through the updater.
    pub tiles_loaded: usize,
    /// Zipper tiles synthesized across tile borders.
    pub zipper_tiles: usize,
    /// Queries answered by a resident tile.
    pub hits: usize,
    /// Tiles dropped to make room for new ones.
    pub evictions: usize,
}

/// A resident tile.
#[derive(Debug)]
struct Slot<T> {
    tile: Rc<T>,
    zipper: bool,
}

/// Bounded pool of tiles, most recently used first.
///
/// [`get_tile`](TilesCache::get_tile) always returns a tile able to
/// interpolate the requested point. Points near tile borders are answered by
/// zipper tiles stitched from the neighboring tiles, so callers never see an
/// edge, a corner, the antimeridian or a change of resolution.
///
/// The cache is meant for one thread; use one cache per worker.
///
/// # Example
///
/// ```
/// use dem_raster::{FunctionUpdater, SampleLayout, SimpleTile, Tile, TileGrid, TilesCache};
///
/// let grid = TileGrid::new(1.0_f64.to_radians(), 11, SampleLayout::CellCentered);
/// let updater = FunctionUpdater::new(grid, |lat, lon| 100.0 + 1000.0 * (lat + lon));
/// let mut cache = TilesCache::with_capacity(SimpleTile::new, updater, 8)?;
///
/// // right on the corner of four tiles
/// let (lat, lon) = (1.0_f64.to_radians(), 2.0_f64.to_radians());
/// let tile = cache.get_tile(lat, lon)?;
/// let elevation = tile.interpolate_elevation(lat, lon)?;
/// assert!((elevation - (100.0 + 1000.0 * (lat + lon))).abs() < 1.0e-6);
/// # Ok::<(), dem_raster::DemError>(())
/// ```
#[derive(Debug)]
pub struct TilesCache<T, F, U> {
    factory: F,
    updater: U,
    config: TilesCacheConfig,
    slots: Vec<Slot<T>>,
    stats: CacheStats,
}

impl<T, F, U> TilesCache<T, F, U>
where
    T: Tile,
    F: TileFactory<T>,
    U: TileUpdater,
{
    /// Create a cache from its configuration.
    pub fn new(factory: F, updater: U, config: TilesCacheConfig) -> Result<Self> {
        if config.max_tiles == 0 {
            return Err(DemError::InvalidCacheCapacity(config.max_tiles));
        }
        Ok(Self {
            factory,
            updater,
            config,
            slots: Vec::with_capacity(config.max_tiles),
            stats: CacheStats::default(),
        })
    }

    /// Create a cache holding at most `max_tiles` tiles, with signed longitudes.
    pub fn with_capacity(factory: F, updater: U, max_tiles: usize) -> Result<Self> {
        Self::new(
            factory,
            updater,
            TilesCacheConfig {
                max_tiles,
                ..TilesCacheConfig::default()
            },
        )
    }

    /// Get a tile able to interpolate the elevation at a point (radians).
    ///
    /// The returned tile classifies the point as
    /// [`Location::HasInterpolationNeighbors`]. It is either a resident tile,
    /// a tile freshly loaded through the updater, or a zipper tile built from
    /// the tiles around a border.
    pub fn get_tile(&mut self, latitude: f64, longitude: f64) -> Result<&T> {
        if let Some(index) = self.find(latitude, longitude) {
            self.promote(index);
            self.stats.hits += 1;
            trace!(
                "TilesCache: hit at ({:.6}, {:.6}) in slot {}",
                latitude.to_degrees(),
                longitude.to_degrees(),
                index
            );
            return Ok(self.front());
        }

        let base = match self.find_owner(latitude, longitude) {
            Some(index) => {
                self.promote(index);
                Rc::clone(&self.slots[0].tile)
            }
            None => {
                let tile = self.load_tile(latitude, longitude)?;
                if tile.location(latitude, longitude) == Location::HasInterpolationNeighbors {
                    return Ok(self.front());
                }
                if !zipper::in_skirt(&*tile, latitude, longitude) {
                    return Err(DemError::TileWithoutRequiredNeighbors {
                        latitude: latitude.to_degrees(),
                        longitude: longitude.to_degrees(),
                    });
                }
                tile
            }
        };

        let zipper = self.synthesize_zipper(&base, latitude, longitude)?;
        self.insert(Rc::new(zipper), true);
        Ok(self.front())
    }

    /// Number of resident tiles.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no tile is resident.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum number of resident tiles.
    pub fn max_tiles(&self) -> usize {
        self.config.max_tiles
    }

    /// Current configuration.
    pub fn config(&self) -> &TilesCacheConfig {
        &self.config
    }

    /// Activity counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop every resident tile. Counters are kept.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Resident tiles, most recently used first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().map(|slot| slot.tile.as_ref())
    }

    /// Get the real (non-zipper) tile whose nominal area contains a point.
    ///
    /// Used to resolve tile neighbors: unlike [`get_tile`](Self::get_tile)
    /// it never answers with a zipper, and the point may lie between the
    /// outermost samples and the tile edge.
    pub(crate) fn get_owning_tile(&mut self, latitude: f64, longitude: f64) -> Result<Rc<T>> {
        if let Some(index) = self.find_owner(latitude, longitude) {
            self.promote(index);
            self.stats.hits += 1;
            return Ok(Rc::clone(&self.slots[0].tile));
        }
        let tile = self.load_tile(latitude, longitude)?;
        if !zipper::owns(&*tile, latitude, longitude) {
            return Err(DemError::TileWithoutRequiredNeighbors {
                latitude: latitude.to_degrees(),
                longitude: longitude.to_degrees(),
            });
        }
        Ok(tile)
    }

    /// Longitude of a neighbor query, normalized into the configured window.
    pub(crate) fn normalize_longitude(&self, longitude: f64) -> f64 {
        self.config.longitude_range.normalize(longitude)
    }

    fn front(&self) -> &T {
        &self.slots[0].tile
    }

    fn find(&self, latitude: f64, longitude: f64) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.tile.location(latitude, longitude) == Location::HasInterpolationNeighbors)
    }

    fn find_owner(&self, latitude: f64, longitude: f64) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| !slot.zipper && zipper::owns(&*slot.tile, latitude, longitude))
    }

    /// Create a tile through the factory and fill it with the updater.
    fn load_tile(&mut self, latitude: f64, longitude: f64) -> Result<Rc<T>> {
        let mut tile = self.factory.create_tile();
        let longitude = self.normalize_longitude(longitude);
        self.updater.update_tile(latitude, longitude, &mut tile)?;
        tile.tile_update_completed()?;
        self.stats.tiles_loaded += 1;
        debug!(
            "TilesCache: loaded {}x{} tile at ({:.4}, {:.4}) for ({:.6}, {:.6})",
            tile.latitude_rows(),
            tile.longitude_columns(),
            tile.min_latitude().to_degrees(),
            tile.min_longitude().to_degrees(),
            latitude.to_degrees(),
            longitude.to_degrees()
        );

        let tile = Rc::new(tile);
        self.insert(Rc::clone(&tile), false);
        Ok(tile)
    }

    fn synthesize_zipper(&mut self, base: &T, latitude: f64, longitude: f64) -> Result<T> {
        let neighbors = self.border_neighbors(base, latitude, longitude)?;
        let others: Vec<&T> = neighbors.iter().map(|tile| tile.as_ref()).collect();
        let zipper = zipper::zip(self.factory.create_tile(), base, &others, latitude, longitude)?;
        self.stats.zipper_tiles += 1;
        debug!(
            "TilesCache: zipper {}x{} from {} tiles at ({:.6}, {:.6})",
            zipper.latitude_rows(),
            zipper.longitude_columns(),
            1 + others.len(),
            latitude.to_degrees(),
            longitude.to_degrees()
        );
        Ok(zipper)
    }

    /// Insert a tile at the front, evicting the least recently used one if full.
    fn insert(&mut self, tile: Rc<T>, zipper: bool) {
        if self.slots.len() >= self.config.max_tiles {
            if let Some(evicted) = self.slots.pop() {
                self.stats.evictions += 1;
                debug!(
                    "TilesCache: evicted {} tile at ({:.4}, {:.4})",
                    if evicted.zipper { "zipper" } else { "real" },
                    evicted.tile.min_latitude().to_degrees(),
                    evicted.tile.min_longitude().to_degrees()
                );
            }
        }
        self.slots.insert(0, Slot { tile, zipper });
    }

    /// Move a slot to the front.
    fn promote(&mut self, index: usize) {
        self.slots[..=index].rotate_right(1);
    }
}
