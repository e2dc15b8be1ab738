//! Storage models.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

/// User-defined metadata attached to an uploaded object.
pub type Metadata = HashMap<String, String>;

/// Opaque identifier of an object, unique within its bucket.
///
/// The only structure ever read out of a key is its extension, and only for
/// filtering listings; content is always sniffed from the bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything after the last `.`, or `None` if the key has no `.` at all.
    ///
    /// ```
    /// use downscale_storage::ObjectKey;
    ///
    /// assert_eq!(ObjectKey::new("wallpapers/ubuntu.jpg").extension(), Some("jpg"));
    /// assert_eq!(ObjectKey::new("archive.tar.gz").extension(), Some("gz"));
    /// assert_eq!(ObjectKey::new("README").extension(), None);
    /// ```
    pub fn extension(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(_, ext)| ext)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl From<String> for ObjectKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}
impl From<&str> for ObjectKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl Borrow<str> for ObjectKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One page of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in store enumeration order.
    pub keys: Vec<ObjectKey>,
    /// Token to request the following page; `None` once the listing is
    /// exhausted.
    pub next_token: Option<String>,
}
impl ListPage {
    /// A page that is also the last one.
    pub fn last(keys: Vec<ObjectKey>) -> Self {
        Self { keys, next_token: None }
    }
}
