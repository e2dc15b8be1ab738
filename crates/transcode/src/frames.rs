use crate::codec::supports_multi_frame;
use crate::error::{ErrorKind, Result};
use crate::pages;
use crate::region::Region;
use crate::scale::ScaleFactor;
use exn::ResultExt;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, ColorType, Delay, DynamicImage, Frame, ImageFormat};
use std::io::Cursor;

/// Area-weighted: the triangle kernel's support grows with the reduction
/// ratio, so every source pixel contributes to the output.
const FILTER: FilterType = FilterType::Triangle;
/// NeuQuant sampling speed used when re-quantizing GIF frames (1 is the
/// slowest and best, 30 the fastest).
const GIF_QUANTIZE_SPEED: i32 = 10;

/// A single decoded frame.
///
/// The pixel buffer carries its own dimensions and colour model; the format
/// tag records what the bytes were detected as, so the frame can be written
/// back the same way.
#[derive(Clone, Debug)]
pub struct Raster {
    format: ImageFormat,
    pixels: DynamicImage,
    /// Display duration; only present for frames of a multi-frame source.
    delay: Option<Delay>,
}

impl Raster {
    pub fn new(format: ImageFormat, pixels: DynamicImage) -> Self {
        Self { format, pixels, delay: None }
    }

    fn from_frame(format: ImageFormat, frame: Frame) -> Self {
        let delay = Some(frame.delay());
        Self { format, pixels: DynamicImage::ImageRgba8(frame.into_buffer()), delay }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn color(&self) -> ColorType {
        self.pixels.color()
    }

    pub fn delay(&self) -> Option<Delay> {
        self.delay
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    fn resample(self, scale: ScaleFactor) -> Self {
        let (width, height) = scale.dimensions(self.width(), self.height());
        if (width, height) == (self.width(), self.height()) {
            return self;
        }
        Self {
            pixels: self.pixels.resize_exact(width, height, FILTER),
            ..self
        }
    }

    fn crop(self, region: Region) -> Result<Self> {
        if !region.fits(self.width(), self.height()) {
            exn::bail!(ErrorKind::InvalidRegion(format!("{region} outside {}x{} frame", self.width(), self.height())));
        }
        Ok(Self {
            pixels: self.pixels.crop_imm(region.x, region.y, region.width, region.height),
            ..self
        })
    }

    fn into_frame(self) -> Frame {
        let delay = self.delay.unwrap_or_else(|| Delay::from_numer_denom_ms(0, 1));
        Frame::from_parts(self.pixels.into_rgba8(), 0, 0, delay)
    }
}

/// The decoded contents of one encoded object.
///
/// Whether an object yields more than one frame is decided by a codec
/// capability ([`supports_multi_frame`]), never by inspecting the decoder
/// type. A multi-frame source with exactly one frame collapses to
/// [`SingleFrame`](Self::SingleFrame).
#[derive(Clone, Debug)]
pub enum Decoded {
    SingleFrame(Raster),
    /// Frames in display order. Always holds at least two.
    MultiFrame(Vec<Raster>),
}

impl Decoded {
    /// Decode `bytes`, already detected as `format`, into one or more frames.
    ///
    /// Animated PNG and WebP can be read frame by frame but not written back
    /// that way, so an animation in either fails with
    /// [`UnsupportedWriter`](ErrorKind::UnsupportedWriter) instead of being
    /// flattened to its first frame.
    pub fn decode(bytes: &[u8], format: ImageFormat) -> Result<Self> {
        if !supports_multi_frame(format) || !has_several_frames(bytes, format)? {
            if animation_len(bytes, format)? > 1 {
                exn::bail!(ErrorKind::UnsupportedWriter(format!("animated {format:?}")));
            }
            let pixels = image::load_from_memory_with_format(bytes, format).or_raise(|| ErrorKind::Decode)?;
            return Ok(Self::SingleFrame(Raster::new(format, pixels)));
        }
        let mut frames: Vec<Raster> = match format {
            ImageFormat::Tiff => pages::decode(bytes)?.into_iter().map(|page| Raster::new(format, page)).collect(),
            _ => {
                let decoder = GifDecoder::new(Cursor::new(bytes)).or_raise(|| ErrorKind::Decode)?;
                // Frames come out composited onto the full logical screen, so
                // every frame has the canvas dimensions regardless of its
                // sub-rectangle.
                decoder
                    .into_frames()
                    .collect_frames()
                    .or_raise(|| ErrorKind::Decode)?
                    .into_iter()
                    .map(|frame| Raster::from_frame(format, frame))
                    .collect()
            },
        };
        match frames.len() {
            0 => exn::bail!(ErrorKind::Decode),
            1 => Ok(Self::SingleFrame(frames.remove(0))),
            _ => Ok(Self::MultiFrame(frames)),
        }
    }

    /// All frames, in order.
    pub fn frames(&self) -> &[Raster] {
        match self {
            Self::SingleFrame(raster) => std::slice::from_ref(raster),
            Self::MultiFrame(rasters) => rasters,
        }
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }

    /// Resample every frame independently, preserving order.
    pub fn resample(self, scale: ScaleFactor) -> Self {
        match self {
            Self::SingleFrame(raster) => Self::SingleFrame(raster.resample(scale)),
            Self::MultiFrame(rasters) => {
                Self::MultiFrame(rasters.into_iter().map(|raster| raster.resample(scale)).collect())
            },
        }
    }

    /// Cut `region` out of every frame, preserving order.
    ///
    /// Fails with [`InvalidRegion`](ErrorKind::InvalidRegion) if the region
    /// does not lie entirely within any one of the frames.
    pub fn crop(self, region: Region) -> Result<Self> {
        Ok(match self {
            Self::SingleFrame(raster) => Self::SingleFrame(raster.crop(region)?),
            Self::MultiFrame(rasters) => {
                Self::MultiFrame(rasters.into_iter().map(|raster| raster.crop(region)).collect::<Result<_>>()?)
            },
        })
    }

    /// Encode into `format`. Multi-frame content is written as one sequence.
    pub fn encode(self, format: ImageFormat) -> Result<Vec<u8>> {
        let name = format!("{format:?}");
        if !format.writing_enabled() {
            exn::bail!(ErrorKind::UnsupportedWriter(name));
        }
        match self {
            Self::SingleFrame(raster) => {
                let mut output = Cursor::new(Vec::new());
                raster.pixels.write_to(&mut output, format).or_raise(|| ErrorKind::Encode(name))?;
                Ok(output.into_inner())
            },
            Self::MultiFrame(rasters) => match format {
                ImageFormat::Gif => {
                    let mut output = Vec::new();
                    {
                        // The trailer is only written once the encoder is dropped.
                        let mut encoder = GifEncoder::new_with_speed(&mut output, GIF_QUANTIZE_SPEED);
                        encoder.set_repeat(Repeat::Infinite).or_raise(|| ErrorKind::Encode(name.clone()))?;
                        encoder
                            .encode_frames(rasters.into_iter().map(Raster::into_frame))
                            .or_raise(|| ErrorKind::Encode(name))?;
                    }
                    Ok(output)
                },
                ImageFormat::Tiff => {
                    let pages: Vec<DynamicImage> = rasters.into_iter().map(|raster| raster.pixels).collect();
                    pages::encode(&pages)
                },
                _ => exn::bail!(ErrorKind::UnsupportedWriter(name)),
            },
        }
    }
}

/// Whether a format that can hold a sequence actually holds more than one
/// frame. Single-page TIFFs take the regular decoder, which understands
/// more colour models than the page-by-page one.
fn has_several_frames(bytes: &[u8], format: ImageFormat) -> Result<bool> {
    match format {
        ImageFormat::Tiff => Ok(pages::count(bytes)? > 1),
        _ => Ok(true),
    }
}

/// Frame count of an animated PNG or WebP; 1 for everything else.
fn animation_len(bytes: &[u8], format: ImageFormat) -> Result<usize> {
    match format {
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(bytes)).or_raise(|| ErrorKind::Decode)?;
            if !decoder.is_apng().or_raise(|| ErrorKind::Decode)? {
                return Ok(1);
            }
            let apng = decoder.apng().or_raise(|| ErrorKind::Decode)?;
            Ok(apng.into_frames().collect_frames().or_raise(|| ErrorKind::Decode)?.len())
        },
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(bytes)).or_raise(|| ErrorKind::Decode)?;
            if !decoder.has_animation() {
                return Ok(1);
            }
            Ok(decoder.into_frames().collect_frames().or_raise(|| ErrorKind::Decode)?.len())
        },
        _ => Ok(1),
    }
}
