//! Pipeline Error Types
//!
//! Uses [`exn`] for automatic location tracking and error tree construction;
//! each variant names the stage that failed, with the storage or transcode
//! error that caused it as a child.

use derive_more::{Display, Error};

/// A pipeline error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the stage of a pipeline failure.
///
/// ### Fatal
/// - [`ErrorKind::Listing`]: nothing can be scheduled without the key list.
///
/// ### Per key
/// - [`ErrorKind::Fetch`]
/// - [`ErrorKind::Transcode`]
/// - [`ErrorKind::Upload`]
///
/// Per-key failures are recorded in the [`Report`](crate::Report) and never
/// stop other keys from being processed.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Enumerating the source bucket failed.
    #[display("failed to list bucket: {_0}")]
    Listing(#[error(not(source))] String),
    /// The source object could not be downloaded.
    #[display("failed to fetch source object")]
    Fetch,
    /// The object could not be decoded, resampled or re-encoded (including a
    /// transcode that panicked).
    #[display("failed to downscale image")]
    Transcode,
    /// The scaled object could not be uploaded.
    #[display("failed to upload scaled object")]
    Upload,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Store failures may be transient; a transcode failure is a property of
    /// the input bytes.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Transcode)
    }
}
