//! Single HGT tile parsing and elevation extraction.
//!
//! This module provides [`TileFile`] for reading one `.hgt` file and
//! answering point queries against it.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use tracing::{debug, trace};

use crate::addressing::{byte_offset, TileKey, SAMPLE_BYTES};
use crate::error::{HgtError, Result};
use crate::validator::{LatitudeBand, RangeValidator};

/// Samples per row/column of a 1 arc-second tile.
const ONE_ARC_SECOND_SAMPLES: u64 = 3601;

/// Samples per row/column of a 3 arc-second tile.
const THREE_ARC_SECOND_SAMPLES: u64 = 1201;

/// Value indicating no data (void) in HGT files
pub const VOID_VALUE: i16 = -32768;

/// Sample spacing of a tile, detected from its exact file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// 1 arc-second (~30m), 3601 × 3601 samples
    OneArcSecond,
    /// 3 arc-second (~90m), 1201 × 1201 samples
    ThreeArcSecond,
}

impl Resolution {
    /// Returns the number of samples per row/column for this resolution.
    pub fn samples(&self) -> u64 {
        match self {
            Resolution::OneArcSecond => ONE_ARC_SECOND_SAMPLES,
            Resolution::ThreeArcSecond => THREE_ARC_SECOND_SAMPLES,
        }
    }

    /// Returns the sample spacing in arc-seconds (1 or 3).
    pub fn arc_seconds(&self) -> u32 {
        match self {
            Resolution::OneArcSecond => 1,
            Resolution::ThreeArcSecond => 3,
        }
    }

    /// Returns the approximate resolution in meters.
    pub fn meters(&self) -> f64 {
        match self {
            Resolution::OneArcSecond => 30.0,
            Resolution::ThreeArcSecond => 90.0,
        }
    }

    /// Exact byte length of a tile at this resolution.
    pub fn file_len(&self) -> u64 {
        self.samples() * self.samples() * SAMPLE_BYTES
    }

    /// The resolution whose tiles are exactly `len` bytes long, if any.
    pub fn from_file_len(len: u64) -> Option<Self> {
        [Resolution::OneArcSecond, Resolution::ThreeArcSecond]
            .into_iter()
            .find(|r| r.file_len() == len)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-arc-second", self.arc_seconds())
    }
}

/// How samples are fetched from an open tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Offset reads against the file handle; no shared cursor is moved.
    #[default]
    Positioned,
    /// Read-only memory map of the whole tile.
    Mapped,
}

/// Options for [`TileFile::open`].
///
/// [`FileOptions::default`] installs the SRTM latitude band validator and
/// checks each query against the square the file name claims to cover.
/// [`FileOptions::unvalidated`] starts with no range validator.
#[derive(Clone)]
pub struct FileOptions {
    range_validator: Option<Arc<dyn RangeValidator>>,
    ignore_tile_validation: bool,
    read_mode: ReadMode,
}

impl FileOptions {
    /// Options with no range validator. The file name bounds check is still
    /// on; use [`FileOptions::default`] for the SRTM latitude band as well.
    pub fn unvalidated() -> Self {
        Self {
            range_validator: None,
            ignore_tile_validation: false,
            read_mode: ReadMode::default(),
        }
    }

    /// Options for tiles opened by a directory, which already picked the
    /// file from the coordinates and so skips per-query validation.
    pub fn for_directory(read_mode: ReadMode) -> Self {
        Self::unvalidated().ignore_tile_validation(true).read_mode(read_mode)
    }

    /// Run `validator` before every query.
    pub fn range_validator<V: RangeValidator + 'static>(self, validator: V) -> Self {
        self.shared_range_validator(Arc::new(validator))
    }

    /// Run an already shared validator before every query.
    pub fn shared_range_validator(mut self, validator: Arc<dyn RangeValidator>) -> Self {
        self.range_validator = Some(validator);
        self
    }

    pub fn without_range_validator(mut self) -> Self {
        self.range_validator = None;
        self
    }

    /// Skip the range validator and the file name bounds check.
    pub fn ignore_tile_validation(mut self, ignore: bool) -> Self {
        self.ignore_tile_validation = ignore;
        self
    }

    pub fn read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }
}

impl Default for FileOptions {
    fn default() -> Self {
        Self::unvalidated().shared_range_validator(LatitudeBand::srtm().shared())
    }
}

impl fmt::Debug for FileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileOptions")
            .field("range_validator", &self.range_validator.is_some())
            .field("ignore_tile_validation", &self.ignore_tile_validation)
            .field("read_mode", &self.read_mode)
            .finish()
    }
}

enum SampleStore {
    File(File),
    Mapped(Mmap),
}

impl SampleStore {
    fn read_sample(&self, offset: u64) -> io::Result<i16> {
        let mut buf = [0u8; SAMPLE_BYTES as usize];
        match self {
            Self::File(file) => read_exact_at(file, &mut buf, offset)?,
            Self::Mapped(map) => {
                let start = offset as usize;
                let bytes = map
                    .get(start..start + buf.len())
                    .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
                buf.copy_from_slice(bytes);
            }
        }
        Ok(i16::from_be_bytes(buf))
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                let rest = buf;
                buf = &mut rest[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// One open `.hgt` tile.
///
/// Queries take `&self` and never move a shared file cursor, so a tile can
/// be shared between threads behind an `Arc`. The file is released when the
/// tile is closed or dropped.
///
/// # Example
///
/// ```ignore
/// use hgt::{FileOptions, TileFile};
///
/// let tile = TileFile::open("/data/srtm/N48E021.hgt", FileOptions::default())?;
/// let (elevation, resolution) = tile.elevation_at(48.7162, 21.2613)?;
/// println!("{}m ({})", elevation, resolution);
/// tile.close();
/// ```
pub struct TileFile {
    path: PathBuf,
    store: SampleStore,
    resolution: Resolution,
    options: FileOptions,
}

impl TileFile {
    /// Open a tile, detecting its resolution from the file size.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened, inspected or memory-mapped ([`HgtError::Io`])
    /// - The size is neither 1 nor 3 arc-second ([`HgtError::UnsupportedResolution`])
    pub fn open<P: AsRef<Path>>(path: P, options: FileOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        let resolution =
            Resolution::from_file_len(size).ok_or(HgtError::UnsupportedResolution { size })?;

        let store = match options.read_mode {
            ReadMode::Positioned => SampleStore::File(file),
            ReadMode::Mapped => {
                // SAFETY: the mapping is read-only and never handed out; tiles
                // are not expected to be rewritten while open.
                let map = unsafe { Mmap::map(&file)? };
                SampleStore::Mapped(map)
            }
        };

        debug!(path = %path.display(), %resolution, mode = ?options.read_mode, "opened tile");

        Ok(Self {
            path: path.to_path_buf(),
            store,
            resolution,
            options,
        })
    }

    /// Elevation in meters at the coordinates, with the tile's resolution.
    ///
    /// Unless the tile was opened with `ignore_tile_validation`, the range
    /// validator runs first and the coordinates must fall inside the square
    /// named by the file itself.
    ///
    /// # Errors
    ///
    /// - [`HgtError::OutOfRange`] - rejected by the validator or outside the tile
    /// - [`HgtError::InvalidFileName`] - the file name isn't a tile name
    /// - [`HgtError::VoidData`] - the sample is [`VOID_VALUE`]
    /// - [`HgtError::Io`] - the read failed
    pub fn elevation_at(&self, lat: f64, lon: f64) -> Result<(i16, Resolution)> {
        if !self.options.ignore_tile_validation {
            self.check_coverage(lat, lon)?;
        }

        let offset = byte_offset(lat, lon, self.resolution.samples());
        let elevation = self.store.read_sample(offset)?;
        trace!(lat, lon, offset, elevation, "read sample");

        if elevation == VOID_VALUE {
            return Err(HgtError::VoidData { lat, lon });
        }

        Ok((elevation, self.resolution))
    }

    fn check_coverage(&self, lat: f64, lon: f64) -> Result<()> {
        if let Some(validator) = &self.options.range_validator {
            validator.validate(lat, lon)?;
        }

        if !self.key()?.claimed_bounds().contains(lat, lon) {
            return Err(HgtError::OutOfRange { lat, lon });
        }

        Ok(())
    }

    /// The tile key this file's name claims.
    pub fn key(&self) -> Result<TileKey> {
        TileKey::from_path(&self.path)
    }

    /// Returns the resolution of this tile.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the number of samples per row/column.
    pub fn samples(&self) -> u64 {
        self.resolution.samples()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the underlying file handle.
    pub fn close(self) {
        debug!(path = %self.path.display(), "closed tile");
    }
}

impl fmt::Debug for TileFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileFile")
            .field("path", &self.path)
            .field("resolution", &self.resolution)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
