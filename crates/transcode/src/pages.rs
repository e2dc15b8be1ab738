//! Multi-page TIFF.
//!
//! `image` only ever reads the first directory of a TIFF file, so documents
//! with several pages go straight through the `tiff` codec instead.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{TiffEncoder, colortype};

/// Number of image directories (pages) in a TIFF file.
pub(crate) fn count(bytes: &[u8]) -> Result<usize> {
    let mut decoder = Decoder::new(Cursor::new(bytes)).or_raise(|| ErrorKind::Decode)?;
    let mut pages = 1;
    while decoder.more_images() {
        decoder.next_image().or_raise(|| ErrorKind::Decode)?;
        pages += 1;
    }
    Ok(pages)
}

/// Decode every page, in file order.
pub(crate) fn decode(bytes: &[u8]) -> Result<Vec<DynamicImage>> {
    let mut decoder = Decoder::new(Cursor::new(bytes)).or_raise(|| ErrorKind::Decode)?;
    let mut pages = Vec::new();
    loop {
        let (width, height) = decoder.dimensions().or_raise(|| ErrorKind::Decode)?;
        let colour = decoder.colortype().or_raise(|| ErrorKind::Decode)?;
        let data = decoder.read_image().or_raise(|| ErrorKind::Decode)?;
        let Some(page) = into_image(width, height, colour, data) else {
            tracing::debug!(page = pages.len(), ?colour, "Unsupported colour model in multi-page TIFF");
            exn::bail!(ErrorKind::Decode);
        };
        pages.push(page);
        if !decoder.more_images() {
            break;
        }
        decoder.next_image().or_raise(|| ErrorKind::Decode)?;
    }
    Ok(pages)
}

fn into_image(width: u32, height: u32, colour: ColorType, data: DecodingResult) -> Option<DynamicImage> {
    match (colour, data) {
        (ColorType::Gray(8), DecodingResult::U8(raw)) => GrayImage::from_raw(width, height, raw).map(DynamicImage::ImageLuma8),
        (ColorType::GrayA(8), DecodingResult::U8(raw)) => {
            GrayAlphaImage::from_raw(width, height, raw).map(DynamicImage::ImageLumaA8)
        },
        (ColorType::RGB(8), DecodingResult::U8(raw)) => RgbImage::from_raw(width, height, raw).map(DynamicImage::ImageRgb8),
        (ColorType::RGBA(8), DecodingResult::U8(raw)) => {
            RgbaImage::from_raw(width, height, raw).map(DynamicImage::ImageRgba8)
        },
        (ColorType::Gray(16), DecodingResult::U16(raw)) => {
            ImageBuffer::<Luma<u16>, _>::from_raw(width, height, raw).map(DynamicImage::ImageLuma16)
        },
        (ColorType::RGB(16), DecodingResult::U16(raw)) => {
            ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, raw).map(DynamicImage::ImageRgb16)
        },
        (ColorType::RGBA(16), DecodingResult::U16(raw)) => {
            ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, raw).map(DynamicImage::ImageRgba16)
        },
        _ => None,
    }
}

/// Write `pages` as one TIFF file with a directory per page.
///
/// Colour models without a TIFF equivalent are widened to 8-bit RGBA.
pub(crate) fn encode(pages: &[DynamicImage]) -> Result<Vec<u8>> {
    let error = || ErrorKind::Encode("Tiff".to_string());
    let mut output = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut output).or_raise(error)?;
        for page in pages {
            let (width, height) = (page.width(), page.height());
            match page {
                DynamicImage::ImageLuma8(buffer) => encoder.write_image::<colortype::Gray8>(width, height, buffer),
                DynamicImage::ImageLuma16(buffer) => encoder.write_image::<colortype::Gray16>(width, height, buffer),
                DynamicImage::ImageRgb8(buffer) => encoder.write_image::<colortype::RGB8>(width, height, buffer),
                DynamicImage::ImageRgb16(buffer) => encoder.write_image::<colortype::RGB16>(width, height, buffer),
                DynamicImage::ImageRgba8(buffer) => encoder.write_image::<colortype::RGBA8>(width, height, buffer),
                DynamicImage::ImageRgba16(buffer) => encoder.write_image::<colortype::RGBA16>(width, height, buffer),
                other => encoder.write_image::<colortype::RGBA8>(width, height, &other.to_rgba8()),
            }
            .or_raise(error)?;
        }
    }
    Ok(output.into_inner())
}
