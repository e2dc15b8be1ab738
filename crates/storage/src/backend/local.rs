//! Local filesystem object store.
//!
//! Buckets are directories directly beneath a configured root, and keys are
//! `/`-separated paths inside them. Files are accessed via `tokio::fs` for
//! async I/O.

use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use crate::models::{ListPage, Metadata, ObjectKey};
use crate::ObjectStore;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(ObjectKey),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem object store.
///
/// Handy for trying out a configuration without any cloud credentials.
/// Object metadata has nowhere to live on a plain filesystem and is
/// discarded on upload.
///
/// The whole bucket is listed as a single page, in lexicographic key order.
///
/// # Examples
///
/// ```no_run
/// use downscale_storage::backend::LocalStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalStore::new("local", "/srv/buckets")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalStore {
    name: String,
    /// Directory holding one subdirectory per bucket
    root: PathBuf,
}
impl LocalStore {
    /// Create a new local filesystem store.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Only happens once at startup; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, "", &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root })
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(bucket)?))
    }

    fn object_path(&self, bucket: &str, key: &ObjectKey) -> Result<PathBuf> {
        Ok(self.bucket_path(bucket)?.join(validate_key(key.as_str())?))
    }

    /// Convert a path found while walking a bucket back into its key.
    fn key_for(bucket_root: &Path, absolute: &Path) -> Result<Option<ObjectKey>> {
        let relative = absolute.strip_prefix(bucket_root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within bucket `{:?}`", absolute, bucket_root))
        })?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(part) => parts.push(part),
                    None => return Ok(None),
                },
                _ => return Ok(None),
            }
        }
        Ok(Some(ObjectKey::new(parts.join("/"))))
    }

    fn map_io_error(e: std::io::Error, bucket: &str, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(bucket.to_string(), key.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(format!("{bucket}/{key}")),
            _ => ErrorKind::Io(e),
        }
    }

    async fn process_entry(&self, bucket: &str, bucket_root: &Path, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, bucket, &path.display().to_string()))?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() {
            return match Self::key_for(bucket_root, &path)? {
                Some(key) => Ok(WalkEntry::File(key)),
                None => {
                    tracing::warn!(bucket, path = %path.display(), "Skipping file whose name is not valid UTF-8");
                    Ok(WalkEntry::Skip)
                },
            };
        }
        // Note: silently drop what is most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_page(&self, bucket: &str, continuation: Option<&str>) -> Result<ListPage> {
        if let Some(token) = continuation {
            exn::bail!(ErrorKind::BackendError(format!("unexpected continuation token `{token}`")));
        }
        let bucket_root = self.bucket_path(bucket)?;
        // A missing bucket is an error, the same as S3-compatible stores.
        if !fs::try_exists(&bucket_root).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::NotFound(bucket.to_string(), String::new()));
        }

        let mut keys = Vec::new();
        let mut stack = vec![bucket_root.clone()];
        while let Some(current) = stack.pop() {
            let mut entries = fs::read_dir(&current)
                .await
                .map_err(|e| Self::map_io_error(e, bucket, &current.display().to_string()))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::map_io_error(e, bucket, &current.display().to_string()))?
            {
                match self.process_entry(bucket, &bucket_root, entry).await? {
                    WalkEntry::File(key) => keys.push(key),
                    WalkEntry::Descend(dir) => stack.push(dir),
                    WalkEntry::Skip => {},
                }
            }
        }
        // Directory iteration order is platform-dependent.
        keys.sort();
        Ok(ListPage::last(keys))
    }

    async fn get(&self, bucket: &str, key: &ObjectKey) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        Ok(fs::read(&path).await.map_err(|e| Self::map_io_error(e, bucket, key.as_str()))?)
    }

    async fn put(&self, bucket: &str, key: &ObjectKey, data: Vec<u8>, _metadata: &Metadata) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        // Buckets are never created implicitly; prefixes inside one are.
        if !fs::try_exists(self.bucket_path(bucket)?).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::NotFound(bucket.to_string(), String::new()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, bucket, key.as_str()))?;
        }
        Ok(fs::write(&path, data).await.map_err(|e| Self::map_io_error(e, bucket, key.as_str()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(buckets: &[&str]) -> (tempfile::TempDir, LocalStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        for bucket in buckets {
            std::fs::create_dir(temp_dir.path().join(bucket)).unwrap();
        }
        let store = LocalStore::new("local", temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalStore::new("name", temp_dir.path()).is_ok());
        assert!(LocalStore::new("name", "relative/path").is_err());
        assert!(LocalStore::new("name", "./relative").is_err());
    }

    #[test]
    fn test_object_path() {
        let (temp_dir, store) = store(&[]);
        let expected = temp_dir.path().join("photos/2024/a.jpg");
        assert_eq!(store.object_path("photos", &ObjectKey::from("2024/a.jpg")).unwrap(), expected);
        // Neither the bucket nor the key may climb out of the root.
        assert!(store.object_path("photos", &ObjectKey::from("../../etc/passwd")).is_err());
        assert!(store.object_path("..", &ObjectKey::from("a.jpg")).is_err());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (_temp_dir, store) = store(&["photos"]);
        store.put("photos", &ObjectKey::from("a/b/c.png"), b"pixels".to_vec(), &Metadata::new()).await.unwrap();
        let data = store.get("photos", &ObjectKey::from("a/b/c.png")).await.unwrap();
        assert_eq!(data, b"pixels");
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (_temp_dir, store) = store(&["photos"]);
        let key = ObjectKey::from("a.png");
        store.put("photos", &key, b"first".to_vec(), &Metadata::new()).await.unwrap();
        store.put("photos", &key, b"second".to_vec(), &Metadata::new()).await.unwrap();
        assert_eq!(store.get("photos", &key).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_put_to_missing_bucket_is_not_found() {
        let (temp_dir, store) = store(&[]);
        let err = store.put("thumbs", &ObjectKey::from("a.png"), b"x".to_vec(), &Metadata::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(bucket, _) if bucket == "thumbs"));
        assert!(!temp_dir.path().join("thumbs").exists());
    }

    #[tokio::test]
    async fn test_keys_that_would_alias_are_refused() {
        let (_temp_dir, store) = store(&["photos"]);
        store.put("photos", &ObjectKey::from("b.png"), b"original".to_vec(), &Metadata::new()).await.unwrap();
        for alias in ["a/../b.png", "./b.png", "/b.png"] {
            let err = store.put("photos", &ObjectKey::from(alias), b"clobber".to_vec(), &Metadata::new()).await.unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidKey(_)), "{alias}");
        }
        assert!(store.get("photos", &ObjectKey::from("a//b.png")).await.is_err());
        assert_eq!(store.get("photos", &ObjectKey::from("b.png")).await.unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_temp_dir, store) = store(&["photos"]);
        let err = store.get("photos", &ObjectKey::from("missing.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(bucket, key) if bucket == "photos" && key == "missing.png"));
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_recursive() {
        let (_temp_dir, store) = store(&["photos"]);
        for key in ["z.png", "a.jpg", "nested/deeper/m.gif", "nested/b.txt"] {
            store.put("photos", &ObjectKey::from(key), b"data".to_vec(), &Metadata::new()).await.unwrap();
        }
        let page = store.list_page("photos", None).await.unwrap();
        assert_eq!(page.next_token, None);
        let keys: Vec<_> = page.keys.iter().map(ObjectKey::as_str).collect();
        assert_eq!(keys, vec!["a.jpg", "nested/b.txt", "nested/deeper/m.gif", "z.png"]);
    }

    #[tokio::test]
    async fn test_list_only_sees_its_own_bucket() {
        let (_temp_dir, store) = store(&["src", "dst"]);
        store.put("src", &ObjectKey::from("a.png"), b"data".to_vec(), &Metadata::new()).await.unwrap();
        store.put("dst", &ObjectKey::from("b.png"), b"data".to_vec(), &Metadata::new()).await.unwrap();
        assert_eq!(store.list("src").await.unwrap(), vec![ObjectKey::from("a.png")]);
    }

    #[tokio::test]
    async fn test_list_empty_bucket() {
        let (_temp_dir, store) = store(&["empty"]);
        assert!(store.list("empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_missing_bucket_is_not_found() {
        let (_temp_dir, store) = store(&[]);
        let err = store.list("nope").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(bucket, _) if bucket == "nope"));
    }

    #[tokio::test]
    async fn test_list_rejects_foreign_token() {
        let (_temp_dir, store) = store(&["photos"]);
        assert!(store.list_page("photos", Some("token")).await.is_err());
    }
}
