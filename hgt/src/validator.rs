//! Range validators that reject coordinates before any tile is touched.

use std::sync::Arc;

use crate::error::{HgtError, Result};

/// Southern edge of SRTM coverage assumed by [`LatitudeBand::srtm`].
pub const SRTM_MIN_LAT: f64 = -56.0;

/// Northern edge (exclusive) of SRTM coverage assumed by [`LatitudeBand::srtm`].
pub const SRTM_MAX_LAT: f64 = 60.0;

/// Decides whether a coordinate may be queried.
///
/// Any `Fn(f64, f64) -> Result<()>` closure is a validator:
///
/// ```
/// use hgt::{HgtError, RangeValidator};
///
/// let northern = |lat: f64, lon: f64| {
///     if lat < 0.0 {
///         return Err(HgtError::OutOfRange { lat, lon });
///     }
///     Ok(())
/// };
/// assert!(northern.validate(10.0, 0.0).is_ok());
/// assert!(northern.validate(-10.0, 0.0).is_err());
/// ```
pub trait RangeValidator: Send + Sync {
    /// Returns an error (normally [`HgtError::OutOfRange`]) for rejected coordinates.
    fn validate(&self, lat: f64, lon: f64) -> Result<()>;
}

impl<F> RangeValidator for F
where
    F: Fn(f64, f64) -> Result<()> + Send + Sync,
{
    fn validate(&self, lat: f64, lon: f64) -> Result<()> {
        self(lat, lon)
    }
}

/// Accepts latitudes in `[min_lat, max_lat)`, any longitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatitudeBand {
    pub min_lat: f64,
    pub max_lat: f64,
}

impl LatitudeBand {
    pub fn new(min_lat: f64, max_lat: f64) -> Self {
        Self { min_lat, max_lat }
    }

    /// The `[-56, 60)` band outside of which no SRTM coverage is assumed.
    pub fn srtm() -> Self {
        Self::new(SRTM_MIN_LAT, SRTM_MAX_LAT)
    }

    pub(crate) fn shared(self) -> Arc<dyn RangeValidator> {
        Arc::new(self)
    }
}

impl Default for LatitudeBand {
    fn default() -> Self {
        Self::srtm()
    }
}

impl RangeValidator for LatitudeBand {
    fn validate(&self, lat: f64, lon: f64) -> Result<()> {
        if (self.min_lat..self.max_lat).contains(&lat) {
            Ok(())
        } else {
            Err(HgtError::OutOfRange { lat, lon })
        }
    }
}
