use crate::error::{Error, ErrorKind, Result};
use std::fmt;
use std::str::FromStr;

/// A rectangle of pixels, anchored at its top-left corner.
///
/// Parses from `x,y,width,height`:
///
/// ```
/// use downscale_transcode::Region;
///
/// let region: Region = "10,20,300,200".parse().unwrap();
/// assert_eq!(region, Region::new(10, 20, 300, 200).unwrap());
/// assert!(region.fits(310, 220));
/// assert!(!region.fits(309, 220));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Returns [`InvalidRegion`](ErrorKind::InvalidRegion) for an empty
    /// rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            exn::bail!(ErrorKind::InvalidRegion(format!("{width}x{height} is empty")));
        }
        Ok(Self { x, y, width, height })
    }

    /// Whether the region lies entirely within a `width × height` frame.
    #[must_use]
    pub fn fits(&self, width: u32, height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(right), Some(bottom)) if right <= width && bottom <= height)
    }
}

impl FromStr for Region {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<u32> = match s.split(',').map(|part| part.trim().parse()).collect() {
            Ok(parts) => parts,
            Err(_) => exn::bail!(ErrorKind::InvalidRegion(s.to_string())),
        };
        match parts[..] {
            [x, y, width, height] => Self::new(x, y, width, height),
            _ => exn::bail!(ErrorKind::InvalidRegion(s.to_string())),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}
