//! Tile addressing: coordinates to tile names and in-tile byte offsets.
//!
//! # Name Format
//!
//! HGT files follow the naming convention `{N|S}{lat}{E|W}{lon}.hgt`:
//!
//! - Latitude: 2 digits with N/S prefix (e.g., N48, S57)
//! - Longitude: 3 digits with E/W prefix (e.g., E021, W078)
//!
//! The name represents the **southwest corner** of the 1° × 1° tile. The
//! digits are the magnitude of the floored coordinate, so `-56.7` lands in
//! `S57` while `48.7` lands in `N48`.

use std::fmt;
use std::path::Path;

use crate::error::{HgtError, Result};

/// File extension of HGT tiles.
pub const HGT_EXTENSION: &str = "hgt";

/// Size of one elevation sample in bytes.
pub const SAMPLE_BYTES: u64 = 2;

/// Canonical identity of a tile, e.g. `N48E021`.
///
/// A `TileKey` always holds a well-formed 7 character name; build one with
/// [`tile_key`] or [`TileKey::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey(String);

impl TileKey {
    /// Parse a bare tile name (no directory, no extension).
    ///
    /// # Examples
    ///
    /// ```
    /// use hgt::TileKey;
    ///
    /// assert!(TileKey::parse("N48E021").is_ok());
    /// assert!(TileKey::parse("N48C021").is_err());
    /// ```
    pub fn parse(name: &str) -> Result<Self> {
        let b = name.as_bytes();
        let well_formed = b.len() == 7
            && matches!(b[0], b'N' | b'S')
            && b[1..3].iter().all(u8::is_ascii_digit)
            && matches!(b[3], b'E' | b'W')
            && b[4..7].iter().all(u8::is_ascii_digit);

        if well_formed {
            Ok(Self(name.to_string()))
        } else {
            Err(HgtError::InvalidFileName {
                name: name.to_string(),
            })
        }
    }

    /// Derive the key from a tile path, stripping directories and the extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => Self::parse(stem),
            None => Err(HgtError::InvalidFileName {
                name: path.display().to_string(),
            }),
        }
    }

    /// The bare name, e.g. `N48E021`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The on-disk file name, e.g. `N48E021.hgt`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, HGT_EXTENSION)
    }

    /// Bounds this name claims, as written in the name.
    pub fn claimed_bounds(&self) -> ClaimedBounds {
        // parse() guarantees the layout, so the digit slices always parse.
        let b = self.0.as_bytes();
        ClaimedBounds {
            south: b[0] == b'S',
            lat: digits(&b[1..3]),
            west: b[3] == b'W',
            lon: digits(&b[4..7]),
        }
    }

    /// Signed southwest corner `(lat, lon)` in whole degrees.
    pub fn sw_corner(&self) -> (i32, i32) {
        let bounds = self.claimed_bounds();
        let lat = bounds.lat as i32;
        let lon = bounds.lon as i32;
        (
            if bounds.south { -lat } else { lat },
            if bounds.west { -lon } else { lon },
        )
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TileKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn digits(bytes: &[u8]) -> f64 {
    bytes
        .iter()
        .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0')) as f64
}

/// The degree square a tile name claims to cover.
///
/// Magnitudes are kept unsigned together with their hemisphere, and a
/// coordinate is checked after negating it for southern and western
/// tiles: `S57` accepts latitudes whose negation lies in `[57, 58)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaimedBounds {
    /// Latitude is in the southern hemisphere.
    pub south: bool,
    /// Latitude magnitude from the name.
    pub lat: f64,
    /// Longitude is in the western hemisphere.
    pub west: bool,
    /// Longitude magnitude from the name.
    pub lon: f64,
}

impl ClaimedBounds {
    /// Whether `(lat, lon)` falls in the half-open square `[m, m+1)` on both axes.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let lat = if self.south { -lat } else { lat };
        let lon = if self.west { -lon } else { lon };

        (self.lat..self.lat + 1.0).contains(&lat) && (self.lon..self.lon + 1.0).contains(&lon)
    }
}

/// Tile key for the tile containing the coordinates.
///
/// # Examples
///
/// ```
/// use hgt::addressing::tile_key;
///
/// assert_eq!(tile_key(48.7162, 21.2613).as_str(), "N48E021");
/// assert_eq!(tile_key(-56.7, -0.5).as_str(), "S57W001");
/// assert_eq!(tile_key(0.0, 0.0).as_str(), "N00E000");
/// ```
pub fn tile_key(lat: f64, lon: f64) -> TileKey {
    let lat_prefix = if lat < 0.0 { 'S' } else { 'N' };
    let lon_prefix = if lon < 0.0 { 'W' } else { 'E' };

    let lat_int = lat.floor() as i32;
    let lon_int = lon.floor() as i32;

    TileKey(format!(
        "{}{:02}{}{:03}",
        lat_prefix,
        lat_int.unsigned_abs(),
        lon_prefix,
        lon_int.unsigned_abs()
    ))
}

/// Byte offset of the sample covering `(lat, lon)` in a tile with
/// `samples` rows and columns.
///
/// Rows are stored north to south, so the row index counts down from the
/// top of the file as latitude increases.
pub fn byte_offset(lat: f64, lon: f64, samples: u64) -> u64 {
    let n = samples as f64;
    let last = samples.saturating_sub(1);

    let x = (((lon - lon.floor()) * n).floor() as u64).min(last);
    let y = (((lat - lat.floor()) * n).floor() as u64).min(last);

    (x + (samples - y - 1) * samples) * SAMPLE_BYTES
}
