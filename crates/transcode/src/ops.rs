//! Transcode Operations

use crate::codec::detect;
use crate::error::{ErrorKind, Result};
use crate::frames::Decoded;
use crate::region::Region;
use crate::scale::ScaleFactor;
use image::ImageFormat;
use tracing::instrument;

/// The output of a successful [`transcode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    /// Detected input format, which is also the output format.
    pub format: ImageFormat,
    /// Number of frames written (1 for stills).
    pub frames: usize,
    /// Output dimensions of the first frame.
    pub width: u32,
    pub height: u32,
    /// Encoded bytes.
    pub data: Vec<u8>,
}

/// Down-scale an encoded image, writing it back in the format it was
/// detected as.
///
/// 1. The format is detected from content, not from any file name.
/// 2. The image is decoded into one or more frames (GIF frames, TIFF pages).
/// 3. Every frame is resampled independently to
///    `max(1, floor(dimension × scale))`.
/// 4. The frames are re-encoded, in order, into the same format.
///
/// # Errors
/// - [`UnrecognizedFormat`](ErrorKind::UnrecognizedFormat) or
///   [`Decode`](ErrorKind::Decode) when the input can't be read.
/// - [`UnsupportedWriter`](ErrorKind::UnsupportedWriter) or
///   [`Encode`](ErrorKind::Encode) when the result can't be written back. A
///   format with no writer at all is detected before any pixels are decoded;
///   an animated PNG or WebP is refused once its frames have been counted.
///
/// # Examples
///
/// ```
/// use downscale_transcode::{ImageFormat, ScaleFactor, transcode};
/// use image::{DynamicImage, RgbImage};
/// use std::io::Cursor;
///
/// let mut png = Cursor::new(Vec::new());
/// DynamicImage::ImageRgb8(RgbImage::new(800, 600)).write_to(&mut png, ImageFormat::Png).unwrap();
///
/// let output = transcode(png.get_ref(), ScaleFactor::HALF).unwrap();
/// assert_eq!(output.format, ImageFormat::Png);
/// assert_eq!((output.width, output.height), (400, 300));
/// ```
#[instrument(skip(input), fields(input_size = input.len(), format, output_size))]
pub fn transcode(input: &[u8], scale: ScaleFactor) -> Result<Transcoded> {
    rewrite(input, |decoded| Ok(decoded.resample(scale)))
}

/// Cut the same `region` out of every frame of an encoded image, writing
/// the result back in the format it was detected as.
///
/// # Errors
/// As [`transcode`], plus [`InvalidRegion`](ErrorKind::InvalidRegion) when
/// the region reaches past the edge of any frame.
#[instrument(skip(input, region), fields(input_size = input.len(), %region, format, output_size))]
pub fn crop(input: &[u8], region: Region) -> Result<Transcoded> {
    rewrite(input, |decoded| decoded.crop(region))
}

/// Detect, decode, apply `edit` to the frames, and encode back into the
/// same format. Records `format` and `output_size` on the current span.
fn rewrite(input: &[u8], edit: impl FnOnce(Decoded) -> Result<Decoded>) -> Result<Transcoded> {
    let format = detect(input)?;
    tracing::Span::current().record("format", tracing::field::debug(format));
    if !format.writing_enabled() {
        exn::bail!(ErrorKind::UnsupportedWriter(format!("{format:?}")));
    }

    let edited = edit(Decoded::decode(input, format)?)?;
    let frames = edited.len();
    let (width, height) = edited.frames().first().map(|f| (f.width(), f.height())).unwrap_or_default();
    let data = edited.encode(format)?;

    tracing::Span::current().record("output_size", data.len());
    Ok(Transcoded { format, frames, width, height, data })
}
