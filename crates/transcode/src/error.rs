//! Transcode Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A transcode error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transcode operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No registered reader recognises the input bytes.
    #[display("unrecognized image format")]
    UnrecognizedFormat,
    /// The format was recognised but the data is corrupt or truncated. Don't
    /// retry with the same input.
    #[display("invalid or corrupted image data")]
    Decode,
    /// The detected format can be read but not written back.
    #[display("no writer for format: {_0}")]
    UnsupportedWriter(#[error(not(source))] String),
    /// The encoder rejected the resampled frames.
    #[display("failed to encode image as {_0}")]
    Encode(#[error(not(source))] String),
    /// Scale factor outside of `(0, 1]`.
    #[display("invalid scale factor: {_0}")]
    InvalidScale(#[error(not(source))] String),
    /// Crop rectangle that is empty or doesn't fit inside the image.
    #[display("invalid crop region: {_0}")]
    InvalidRegion(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Transcoding is a pure function of its input; the same bytes will fail
    /// the same way every time.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Returns `true` for failures that happen while reading the input.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::UnrecognizedFormat | Self::Decode)
    }

    /// Returns `true` for failures that happen while writing the output.
    pub fn is_encode(&self) -> bool {
        matches!(self, Self::UnsupportedWriter(_) | Self::Encode(_))
    }
}
