use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use image::ImageFormat;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// File suffixes of every format the registry can read. Queried once per
/// process; the registry is fixed at compile time by `image`'s features.
static SUPPORTED_EXTENSIONS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ImageFormat::all()
        .filter(|format| format.reading_enabled())
        .flat_map(|format| format.extensions_str().iter().copied())
        .collect()
});

/// The set of (lower-case) file suffixes with a registered reader.
pub fn supported_extensions() -> &'static HashSet<&'static str> {
    &SUPPORTED_EXTENSIONS
}

/// Case-insensitive check of a file suffix (without the leading `.`)
/// against [`supported_extensions`].
#[must_use]
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str())
}

/// Whether the format's codec can both decode and encode a sequence of
/// frames (or pages) as a single object.
///
/// Animated PNG and WebP can be *read* frame by frame, but there is no
/// sequence writer for either; see [`Decoded::decode`](crate::Decoded::decode).
#[must_use]
pub fn supports_multi_frame(format: ImageFormat) -> bool {
    matches!(format, ImageFormat::Gif | ImageFormat::Tiff)
}

/// What the codec registry can do with one format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatSupport {
    pub format: ImageFormat,
    pub readable: bool,
    pub writable: bool,
    /// Frame sequences survive a round trip.
    pub multi_frame: bool,
    pub extensions: &'static [&'static str],
    pub mime_type: &'static str,
}

impl fmt::Display for FormatSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |enabled: bool, name: &'static str| if enabled { name } else { "-" };
        write!(
            f,
            "{:<8} {:<5} {:<5} {:<8} {:<24} {}",
            format!("{:?}", self.format),
            flag(self.readable, "read"),
            flag(self.writable, "write"),
            flag(self.multi_frame, "sequence"),
            self.extensions.join(","),
            self.mime_type,
        )
    }
}

/// Every format `image` knows of, including those whose codec isn't
/// compiled in.
pub fn format_support() -> Vec<FormatSupport> {
    ImageFormat::all()
        .map(|format| {
            let readable = format.reading_enabled();
            let writable = format.writing_enabled();
            FormatSupport {
                format,
                readable,
                writable,
                multi_frame: readable && writable && supports_multi_frame(format),
                extensions: format.extensions_str(),
                mime_type: format.to_mime_type(),
            }
        })
        .collect()
}

/// Detect the image format from the content's magic bytes.
///
/// Returns [`UnrecognizedFormat`](ErrorKind::UnrecognizedFormat) if no
/// signature matches, or if the signature belongs to a format whose reader
/// isn't compiled in.
pub fn detect(bytes: &[u8]) -> Result<ImageFormat> {
    let format = image::guess_format(bytes).or_raise(|| ErrorKind::UnrecognizedFormat)?;
    if !format.reading_enabled() {
        exn::bail!(ErrorKind::UnrecognizedFormat);
    }
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("png", true)]
    #[case("PNG", true)]
    #[case("jpg", true)]
    #[case("jpeg", true)]
    #[case("Jpeg", true)]
    #[case("gif", true)]
    #[case("bmp", true)]
    #[case("tiff", true)]
    #[case("txt", false)]
    #[case("html", false)]
    #[case("", false)]
    fn test_is_supported_extension(#[case] ext: &str, #[case] expected: bool) {
        assert_eq!(is_supported_extension(ext), expected);
    }

    #[test]
    fn test_supported_extensions_are_lowercase() {
        assert!(!supported_extensions().is_empty());
        for ext in supported_extensions() {
            assert_eq!(*ext, ext.to_ascii_lowercase());
        }
    }

    #[rstest]
    #[case(ImageFormat::Gif, true)]
    #[case(ImageFormat::Tiff, true)]
    #[case(ImageFormat::Png, false)]
    #[case(ImageFormat::Jpeg, false)]
    #[case(ImageFormat::WebP, false)]
    fn test_supports_multi_frame(#[case] format: ImageFormat, #[case] expected: bool) {
        assert_eq!(supports_multi_frame(format), expected);
    }

    #[rstest]
    #[case(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], ImageFormat::Png)]
    #[case(&[0xFF, 0xD8, 0xFF, 0xE0], ImageFormat::Jpeg)]
    #[case(b"GIF89a", ImageFormat::Gif)]
    #[case(b"BM", ImageFormat::Bmp)]
    fn test_detect_magic_bytes(#[case] bytes: &[u8], #[case] expected: ImageFormat) {
        assert_eq!(detect(bytes).unwrap(), expected);
    }

    #[rstest]
    #[case(b"")]
    #[case(b"<!DOCTYPE html>")]
    #[case(b"plain text notes")]
    fn test_detect_unrecognized(#[case] bytes: &[u8]) {
        let err = detect(bytes).unwrap_err();
        assert_eq!(*err, ErrorKind::UnrecognizedFormat);
    }

    #[test]
    fn test_format_support_matches_registry() {
        let report = format_support();
        let png = report.iter().find(|entry| entry.format == ImageFormat::Png).unwrap();
        assert!(png.readable && png.writable && !png.multi_frame);
        assert_eq!(png.mime_type, "image/png");
        assert!(png.extensions.contains(&"png"));

        let tiff = report.iter().find(|entry| entry.format == ImageFormat::Tiff).unwrap();
        assert!(tiff.multi_frame);

        let readable: HashSet<&str> =
            report.iter().filter(|entry| entry.readable).flat_map(|entry| entry.extensions.iter().copied()).collect();
        assert_eq!(&readable, supported_extensions());
    }

    #[test]
    fn test_format_support_display() {
        let gif = format_support().into_iter().find(|entry| entry.format == ImageFormat::Gif).unwrap();
        let line = gif.to_string();
        assert_eq!(line.split_whitespace().collect::<Vec<_>>(), vec!["Gif", "read", "write", "sequence", "gif", "image/gif"]);
    }
}
