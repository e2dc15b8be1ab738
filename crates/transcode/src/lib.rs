//! Format-preserving image down-scaling.
//!
//! This crate wraps the [`image`] codec registry behind a small, pure
//! interface:
//!
//! - **Format detection** by content ([`detect`]), never by file name, plus
//!   the process-wide set of readable file suffixes
//!   ([`supported_extensions`]) used to pre-filter object listings
//! - **Scaling policy** via [`ScaleFactor`]: uniform, rounded down, never
//!   smaller than one pixel
//! - **Multi-frame awareness** through the [`Decoded`] tagged result; GIF
//!   animations and multi-page TIFFs keep every frame, in order
//! - **Transcoding** ([`transcode`]): decode → resample → encode, always
//!   back into the format the input was detected as
//! - **Cropping** ([`crop`]): the same [`Region`] cut out of every frame
//! - **Capability report** ([`format_support`]): what can be read, written
//!   and kept as a sequence
//!
//! Nothing in this crate touches the filesystem or the network.

mod codec;
pub mod error;
mod frames;
mod ops;
mod pages;
mod region;
mod scale;

pub use crate::codec::{
    FormatSupport, detect, format_support, is_supported_extension, supported_extensions, supports_multi_frame,
};
pub use crate::frames::{Decoded, Raster};
pub use crate::ops::{Transcoded, crop, transcode};
pub use crate::region::Region;
pub use crate::scale::ScaleFactor;
pub use image::ImageFormat;
