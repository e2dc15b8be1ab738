//! Mapping object keys onto filesystem paths.
//!
//! To an object store, `a/b.png`, `a//b.png` and `/a/b.png` are three
//! different objects. A filesystem would resolve all of them to the same
//! file, so only keys that already are a plain relative path are accepted:
//! nothing is ever rewritten.

use crate::error::{ErrorKind, Result};
use std::path::{Component, PathBuf};

/// Turn a key (or bucket name) into the relative path it is stored at.
///
/// Fails with [`InvalidKey`](crate::error::ErrorKind::InvalidKey) unless every
/// `/`-separated segment is a plain file name: no empty segments (so no
/// leading, trailing or doubled `/`), no `.` or `..`, and no NUL bytes.
///
/// ```
/// use downscale_storage::validate_key;
/// use std::path::Path;
///
/// assert_eq!(validate_key("wallpapers/ubuntu.jpg").unwrap(), Path::new("wallpapers/ubuntu.jpg"));
/// assert!(validate_key("a/../b.png").is_err());
/// assert!(validate_key("a//b.png").is_err());
/// assert!(validate_key("/b.png").is_err());
/// ```
pub fn validate(key: &str) -> Result<PathBuf> {
    let invalid = || ErrorKind::InvalidKey(key.to_string());
    let mut path = PathBuf::new();
    for segment in key.split('/') {
        if matches!(segment, "" | "." | "..") || segment.contains('\0') {
            exn::bail!(invalid());
        }
        path.push(segment);
    }
    // A segment can still mean something special to the platform (a drive
    // prefix on Windows, say); each one must come back as a single name.
    let normal = path.components().all(|component| matches!(component, Component::Normal(_)));
    if !normal || path.components().count() != key.split('/').count() {
        exn::bail!(invalid());
    }
    Ok(path)
}
