//! Elevation queries against a directory of HGT tiles.
//!
//! This module provides [`TileDirectory`], which picks the tile for each
//! coordinate, opens it on first use and keeps it in a shared
//! [`TileCache`] for later queries.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::addressing::{tile_key, TileKey};
use crate::cache::{MokaTileCache, NoCache, TileCache};
use crate::error::{HgtError, Result};
use crate::tile::{FileOptions, ReadMode, Resolution, TileFile};
use crate::validator::{LatitudeBand, RangeValidator, SRTM_MAX_LAT, SRTM_MIN_LAT};

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of tiles currently in the cache.
    pub entry_count: u64,
    /// Number of cache hits (requests served from cache).
    pub hit_count: u64,
    /// Number of cache misses (tiles opened from disk).
    pub miss_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Options for [`TileDirectory::open`].
///
/// Defaults to a fresh [`MokaTileCache`], the SRTM latitude band validator
/// (`[-56, 60)`) and positioned reads.
#[derive(Clone)]
pub struct DirOptions {
    cache: Arc<dyn TileCache>,
    range_validator: Option<Arc<dyn RangeValidator>>,
    read_mode: ReadMode,
}

impl DirOptions {
    /// Use `cache` for open tiles. The cache may be shared with other
    /// directories and outlive this one.
    pub fn cache(mut self, cache: Arc<dyn TileCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn range_validator<V: RangeValidator + 'static>(self, validator: V) -> Self {
        self.shared_range_validator(Arc::new(validator))
    }

    pub fn shared_range_validator(mut self, validator: Arc<dyn RangeValidator>) -> Self {
        self.range_validator = Some(validator);
        self
    }

    pub fn without_range_validator(mut self) -> Self {
        self.range_validator = None;
        self
    }

    /// How tiles opened by the directory read their samples.
    pub fn read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }
}

impl Default for DirOptions {
    fn default() -> Self {
        Self {
            cache: Arc::new(MokaTileCache::new()),
            range_validator: Some(LatitudeBand::srtm().shared()),
            read_mode: ReadMode::default(),
        }
    }
}

impl fmt::Debug for DirOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirOptions")
            .field("range_validator", &self.range_validator.is_some())
            .field("read_mode", &self.read_mode)
            .finish_non_exhaustive()
    }
}

/// A directory of `.hgt` tiles answering elevation queries anywhere it has coverage.
///
/// Tiles are opened on first use and kept in the configured [`TileCache`].
/// Concurrent first queries for the same tile open it once.
///
/// # Example
///
/// ```ignore
/// use hgt::{DirOptions, TileDirectory};
///
/// let dir = TileDirectory::open("/data/srtm", DirOptions::default())?;
///
/// // Opens N48E021.hgt
/// let (elevation, resolution) = dir.elevation_at(48.7162, 21.2613)?;
///
/// // Same tile, served from the cache
/// let (elevation2, _) = dir.elevation_at(48.7200, 21.2600)?;
///
/// let stats = dir.cache_stats();
/// println!("Cache hit rate: {:.1}%", stats.hit_rate() * 100.0);
///
/// dir.close()?;
/// ```
pub struct TileDirectory {
    /// Directory containing .hgt files.
    data_dir: PathBuf,
    cache: Arc<dyn TileCache>,
    range_validator: Option<Arc<dyn RangeValidator>>,
    read_mode: ReadMode,
    /// Number of queries served by an already open tile.
    hit_count: AtomicU64,
    /// Number of tiles opened.
    miss_count: AtomicU64,
}

impl TileDirectory {
    /// Open a tile directory.
    ///
    /// # Errors
    ///
    /// Returns the platform's "not found" [`HgtError::Io`] if `data_dir`
    /// doesn't exist.
    pub fn open<P: AsRef<Path>>(data_dir: P, options: DirOptions) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        if let Err(e) = fs::metadata(data_dir) {
            if e.kind() == io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }

        debug!(dir = %data_dir.display(), ?options, "opened tile directory");

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            cache: options.cache,
            range_validator: options.range_validator,
            read_mode: options.read_mode,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        })
    }

    /// Create a builder for more configuration options.
    pub fn builder<P: AsRef<Path>>(data_dir: P) -> TileDirectoryBuilder {
        TileDirectoryBuilder::new(data_dir)
    }

    /// Elevation in meters at the coordinates, with the resolution of the
    /// tile that answered.
    ///
    /// # Errors
    ///
    /// - [`HgtError::OutOfRange`] - rejected by the range validator
    /// - [`HgtError::Io`] - the tile is missing ([`HgtError::is_not_found`]) or unreadable
    /// - [`HgtError::UnsupportedResolution`] - the tile has the wrong size
    /// - [`HgtError::VoidData`] - no elevation recorded at this sample
    pub fn elevation_at(&self, lat: f64, lon: f64) -> Result<(i16, Resolution)> {
        if let Some(validator) = &self.range_validator {
            validator.validate(lat, lon)?;
        }

        let tile = self.load_tile(tile_key(lat, lon))?;
        tile.elevation_at(lat, lon)
    }

    /// Fetch a tile from the cache, opening it from disk on a miss.
    fn load_tile(&self, key: TileKey) -> Result<Arc<TileFile>> {
        let path = self.data_dir.join(key.file_name());
        let opened = AtomicBool::new(false);

        let init = || {
            opened.store(true, Ordering::Relaxed);
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            debug!(tile = %key, path = %path.display(), "cache miss, opening tile");

            // The tile was chosen from the coordinates, so skip re-validating them.
            TileFile::open(&path, FileOptions::for_directory(self.read_mode))
        };

        let tile = self.cache.get_or_try_insert_with(key.clone(), &init)?;
        if !opened.load(Ordering::Relaxed) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
        }

        Ok(tile)
    }

    /// Close every cached tile.
    pub fn close(&self) -> Result<()> {
        debug!(dir = %self.data_dir.display(), "closing tile directory");
        self.cache.clear_all()
    }

    /// Get cache statistics.
    ///
    /// Returns information about cache usage including hit rate.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The cache holding this directory's open tiles.
    pub fn cache(&self) -> &Arc<dyn TileCache> {
        &self.cache
    }
}

impl fmt::Debug for TileDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileDirectory")
            .field("data_dir", &self.data_dir)
            .field("read_mode", &self.read_mode)
            .field("stats", &self.cache_stats())
            .finish_non_exhaustive()
    }
}

/// Builder for creating [`TileDirectory`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use hgt::{ReadMode, TileDirectoryBuilder};
///
/// let dir = TileDirectoryBuilder::new("/data/srtm")
///     .read_mode(ReadMode::Mapped)
///     .build()?;
/// ```
#[derive(Debug)]
pub struct TileDirectoryBuilder {
    data_dir: PathBuf,
    options: DirOptions,
}

impl TileDirectoryBuilder {
    /// Create a new builder with the specified data directory.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            options: DirOptions::default(),
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `HGT_DATA_DIR` | Directory containing .hgt files | Required |
    /// | `HGT_CACHE` | `moka` to keep open tiles, `none` to open per query | `moka` |
    /// | `HGT_READ_MODE` | `positioned` or `mmap` | `positioned` |
    /// | `HGT_MIN_LAT` | Southern edge of accepted latitudes | -56 |
    /// | `HGT_MAX_LAT` | Northern edge (exclusive) of accepted latitudes | 60 |
    ///
    /// Unrecognised values fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `HGT_DATA_DIR` is not set.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("HGT_DATA_DIR").map_err(|_| {
            HgtError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "HGT_DATA_DIR environment variable not set",
            ))
        })?;

        let cache: Arc<dyn TileCache> = match std::env::var("HGT_CACHE") {
            Ok(v) if v.eq_ignore_ascii_case("none") => Arc::new(NoCache),
            _ => Arc::new(MokaTileCache::new()),
        };

        let read_mode = match std::env::var("HGT_READ_MODE") {
            Ok(v) if v.eq_ignore_ascii_case("mmap") || v.eq_ignore_ascii_case("mapped") => {
                ReadMode::Mapped
            }
            _ => ReadMode::Positioned,
        };

        let band = LatitudeBand::new(
            env_f64("HGT_MIN_LAT").unwrap_or(SRTM_MIN_LAT),
            env_f64("HGT_MAX_LAT").unwrap_or(SRTM_MAX_LAT),
        );

        Ok(Self::new(data_dir).cache(cache).range_validator(band).read_mode(read_mode))
    }

    /// Set the data directory.
    ///
    /// Overrides the directory set in the constructor or from environment.
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn cache(mut self, cache: Arc<dyn TileCache>) -> Self {
        self.options = self.options.cache(cache);
        self
    }

    pub fn range_validator<V: RangeValidator + 'static>(mut self, validator: V) -> Self {
        self.options = self.options.range_validator(validator);
        self
    }

    pub fn without_range_validator(mut self) -> Self {
        self.options = self.options.without_range_validator();
        self
    }

    pub fn read_mode(mut self, mode: ReadMode) -> Self {
        self.options = self.options.read_mode(mode);
        self
    }

    /// Build the [`TileDirectory`].
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory doesn't exist.
    pub fn build(self) -> Result<TileDirectory> {
        TileDirectory::open(self.data_dir, self.options)
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
