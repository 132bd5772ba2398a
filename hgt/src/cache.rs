//! Stores of open tiles shared across queries.
//!
//! [`TileCache`] is the capability a [`TileDirectory`](crate::TileDirectory)
//! needs. Two strategies are provided: [`MokaTileCache`], the default,
//! keeps every tile it has opened until [`TileCache::clear_all`], and
//! [`NoCache`] opens a fresh handle for each query.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use moka::sync::Cache;
use tracing::debug;

use crate::addressing::TileKey;
use crate::error::{HgtError, Result};
use crate::tile::TileFile;

/// Key → open tile store.
///
/// Implementations own the tiles inserted into them; a tile is closed once
/// the cache and every in-flight query have dropped their handle.
pub trait TileCache: Send + Sync {
    fn get(&self, key: &TileKey) -> Option<Arc<TileFile>>;

    /// Store `tile` under `key`, replacing any previous entry.
    fn insert(&self, key: TileKey, tile: Arc<TileFile>);

    /// Return the tile for `key`, running `init` to open it if absent.
    ///
    /// Concurrent callers missing on the same key must not each run `init`:
    /// at most one handle per key may be opened, and all callers receive
    /// that handle (or the error opening it).
    fn get_or_try_insert_with(
        &self,
        key: TileKey,
        init: &dyn Fn() -> Result<TileFile>,
    ) -> Result<Arc<TileFile>>;

    /// Close every held tile and empty the store.
    fn clear_all(&self) -> Result<()>;

    /// Number of tiles currently held.
    fn entry_count(&self) -> u64;
}

/// Unbounded concurrent cache backed by `moka`.
///
/// Entries are never evicted on their own; [`TileCache::clear_all`] is the
/// only way to release them.
pub struct MokaTileCache {
    tiles: Cache<TileKey, Arc<TileFile>>,
}

impl MokaTileCache {
    pub fn new() -> Self {
        Self {
            tiles: Cache::builder().build(),
        }
    }
}

impl Default for MokaTileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TileCache for MokaTileCache {
    fn get(&self, key: &TileKey) -> Option<Arc<TileFile>> {
        self.tiles.get(key)
    }

    fn insert(&self, key: TileKey, tile: Arc<TileFile>) {
        self.tiles.insert(key, tile);
    }

    fn get_or_try_insert_with(
        &self,
        key: TileKey,
        init: &dyn Fn() -> Result<TileFile>,
    ) -> Result<Arc<TileFile>> {
        // try_get_with runs init once per key; concurrent callers wait for it
        // and share a copy of its error. The caller that ran init keeps the
        // original.
        let own_error = Mutex::new(None);
        let result = self.tiles.try_get_with(key, || {
            init().map(Arc::new).map_err(|err| {
                let shared = err.duplicate();
                *own_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
                shared
            })
        });
        result.map_err(|shared| {
            own_error
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner)
                .unwrap_or_else(|| HgtError::from_shared(shared))
        })
    }

    fn clear_all(&self) -> Result<()> {
        let keys: Vec<Arc<TileKey>> = self.tiles.iter().map(|(key, _)| key).collect();
        for key in &keys {
            self.tiles.invalidate(key.as_ref());
        }
        // Drop the removed values now instead of on a later access.
        self.tiles.run_pending_tasks();

        debug!(tiles = keys.len(), "cleared tile cache");
        Ok(())
    }

    fn entry_count(&self) -> u64 {
        self.tiles.run_pending_tasks();
        self.tiles.entry_count()
    }
}

impl fmt::Debug for MokaTileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MokaTileCache")
            .field("entry_count", &TileCache::entry_count(self))
            .finish()
    }
}

/// Keeps nothing: every query opens its tile and closes it when done.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl TileCache for NoCache {
    fn get(&self, _key: &TileKey) -> Option<Arc<TileFile>> {
        None
    }

    fn insert(&self, _key: TileKey, _tile: Arc<TileFile>) {}

    fn get_or_try_insert_with(
        &self,
        _key: TileKey,
        init: &dyn Fn() -> Result<TileFile>,
    ) -> Result<Arc<TileFile>> {
        init().map(Arc::new)
    }

    fn clear_all(&self) -> Result<()> {
        Ok(())
    }

    fn entry_count(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::tile_key;
    use crate::tile::{FileOptions, ReadMode, Resolution};
    use std::fs::File;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Weak};
    use tempfile::TempDir;

    fn create_tile(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        File::create(&path)
            .unwrap()
            .set_len(Resolution::ThreeArcSecond.file_len())
            .unwrap();
        path
    }

    fn open(path: &Path) -> Result<TileFile> {
        TileFile::open(path, FileOptions::for_directory(ReadMode::Positioned))
    }

    #[test]
    fn test_get_insert() {
        let dir = TempDir::new().unwrap();
        let path = create_tile(dir.path(), "N35E138.hgt");
        let cache = MokaTileCache::new();
        let key = tile_key(35.5, 138.5);

        assert!(cache.get(&key).is_none());

        let tile = Arc::new(open(&path).unwrap());
        cache.insert(key.clone(), Arc::clone(&tile));

        let cached = cache.get(&key).unwrap();
        assert!(Arc::ptr_eq(&tile, &cached));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_insert_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = create_tile(dir.path(), "N35E138.hgt");
        let cache = MokaTileCache::new();
        let key = tile_key(35.5, 138.5);

        let first = Arc::new(open(&path).unwrap());
        let second = Arc::new(open(&path).unwrap());
        cache.insert(key.clone(), Arc::clone(&first));
        cache.insert(key.clone(), Arc::clone(&second));

        assert!(Arc::ptr_eq(&cache.get(&key).unwrap(), &second));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_get_or_try_insert_with_opens_once() {
        let dir = TempDir::new().unwrap();
        let path = create_tile(dir.path(), "N35E138.hgt");
        let cache = MokaTileCache::new();
        let opens = AtomicUsize::new(0);
        let init = || {
            opens.fetch_add(1, Ordering::SeqCst);
            open(&path)
        };

        let a = cache.get_or_try_insert_with(tile_key(35.5, 138.5), &init).unwrap();
        let b = cache.get_or_try_insert_with(tile_key(35.1, 138.9), &init).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_open_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = MokaTileCache::new();
        let key = tile_key(35.5, 138.5);
        let path = dir.path().join(key.file_name());
        let init = || open(&path);

        let err = cache.get_or_try_insert_with(key.clone(), &init).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cache.entry_count(), 0);

        create_tile(dir.path(), "N35E138.hgt");
        assert!(cache.get_or_try_insert_with(key, &init).is_ok());
    }

    #[test]
    fn test_failed_open_returns_original_error() {
        let dir = TempDir::new().unwrap();
        let cache = MokaTileCache::new();
        let key = tile_key(35.5, 138.5);
        let path = dir.path().join(key.file_name());
        let expected = File::open(&path).unwrap_err();

        let err = cache.get_or_try_insert_with(key, &|| open(&path)).unwrap_err();
        match err {
            HgtError::Io(e) => {
                assert_eq!(e.kind(), expected.kind());
                assert_eq!(e.raw_os_error(), expected.raw_os_error());
                assert!(e.raw_os_error().is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_debug_reports_current_entry_count() {
        let dir = TempDir::new().unwrap();
        let path = create_tile(dir.path(), "N35E138.hgt");
        let cache = MokaTileCache::new();
        cache.insert(tile_key(35.5, 138.5), Arc::new(open(&path).unwrap()));

        assert_eq!(format!("{cache:?}"), "MokaTileCache { entry_count: 1 }");
    }

    #[test]
    fn test_concurrent_first_access_opens_once() {
        const THREADS: usize = 16;

        let dir = TempDir::new().unwrap();
        let path = create_tile(dir.path(), "N35E138.hgt");
        let cache = MokaTileCache::new();
        let opens = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        let tiles: Vec<Arc<TileFile>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        let init = || {
                            opens.fetch_add(1, Ordering::SeqCst);
                            open(&path)
                        };
                        cache
                            .get_or_try_insert_with(tile_key(35.5, 138.5), &init)
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(tiles.iter().all(|t| Arc::ptr_eq(t, &tiles[0])));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_clear_all_closes_tiles() {
        let dir = TempDir::new().unwrap();
        let cache = MokaTileCache::new();
        let mut weak: Vec<Weak<TileFile>> = Vec::new();

        for (lat, name) in [(35.5, "N35E138.hgt"), (36.5, "N36E138.hgt")] {
            let path = create_tile(dir.path(), name);
            let tile = cache
                .get_or_try_insert_with(tile_key(lat, 138.5), &|| open(&path))
                .unwrap();
            weak.push(Arc::downgrade(&tile));
        }
        assert_eq!(cache.entry_count(), 2);

        cache.clear_all().unwrap();

        assert_eq!(cache.entry_count(), 0);
        assert!(cache.get(&tile_key(35.5, 138.5)).is_none());
        assert!(weak.iter().all(|w| w.upgrade().is_none()));
    }

    #[test]
    fn test_no_cache_keeps_nothing() {
        let dir = TempDir::new().unwrap();
        let path = create_tile(dir.path(), "N35E138.hgt");
        let cache = NoCache;
        let key = tile_key(35.5, 138.5);

        let tile = cache.get_or_try_insert_with(key.clone(), &|| open(&path)).unwrap();
        let weak = Arc::downgrade(&tile);

        assert!(cache.get(&key).is_none());
        assert_eq!(cache.entry_count(), 0);

        drop(tile);
        assert!(weak.upgrade().is_none());
        cache.clear_all().unwrap();
    }
}
