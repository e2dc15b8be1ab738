use crate::error::{Error, ErrorKind, Result};
use std::fmt;
use std::str::FromStr;

/// Relative distance from a whole number below which a scaled length is
/// treated as that whole number.
const SNAP_TOLERANCE: f64 = 1e-9;

/// A uniform down-scaling multiplier in the range `(0, 1]`.
///
/// Applied to both width and height, rounded down to the nearest whole pixel,
/// and clamped so that no dimension ever drops below one pixel: a 3×3 image
/// at `0.1` becomes 1×1, not 0×0.
///
/// ```
/// use downscale_transcode::ScaleFactor;
///
/// let half = ScaleFactor::new(0.5).unwrap();
/// assert_eq!(half.dimensions(800, 600), (400, 300));
/// assert!(ScaleFactor::new(1.5).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(try_from = "f64"))]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    /// Leaves images untouched (apart from the re-encode).
    pub const IDENTITY: Self = Self(1.0);
    /// The halving policy the pipeline uses when nothing else is configured.
    pub const HALF: Self = Self(0.5);

    /// Validate a raw multiplier.
    ///
    /// Returns [`InvalidScale`](ErrorKind::InvalidScale) for `NaN`,
    /// infinities, zero, negatives, and anything above `1.0` (up-scaling is
    /// not this crate's business).
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 || value > 1.0 {
            exn::bail!(ErrorKind::InvalidScale(value.to_string()));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(&self) -> f64 {
        self.0
    }

    /// Scale a single dimension: `max(1, floor(length × factor))`.
    ///
    /// The factor is usually written as a decimal (`0.58`) that has no exact
    /// binary representation, so `100 × 0.58` evaluates to `57.999…`. A
    /// product within rounding noise of a whole number snaps to it before
    /// flooring.
    #[must_use]
    pub fn apply(&self, length: u32) -> u32 {
        let product = f64::from(length) * self.0;
        let nearest = product.round();
        let scaled = if (product - nearest).abs() <= SNAP_TOLERANCE * product.max(1.0) {
            nearest
        } else {
            product.floor()
        };
        // Float-to-int `as` saturates, and the factor is at most 1.0 so the
        // product can never exceed the input length anyway.
        (scaled as u32).max(1)
    }

    /// Scale a `(width, height)` pair.
    #[must_use]
    pub fn dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        (self.apply(width), self.apply(height))
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self::HALF
    }
}

impl TryFrom<f64> for ScaleFactor {
    type Error = Error;
    fn try_from(value: f64) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for ScaleFactor {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().parse::<f64>() {
            Ok(value) => Self::new(value),
            Err(_) => exn::bail!(ErrorKind::InvalidScale(s.to_string())),
        }
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
