//! Object-store trait and implementations.
//!
//! This module defines the `ObjectStore` trait, the narrow fetch/put/list
//! contract the pipeline consumes, along with the backends that satisfy it
//! (S3-compatible services, a local directory tree, an in-memory store for
//! tests, and a dry-run decorator).

mod dryrun;
mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::dryrun::DryRunStore;
pub use self::local::LocalStore;
#[cfg(feature = "mock")]
pub use self::mock::MockStore;
#[cfg(feature = "s3")]
pub use self::s3::S3Store;
use crate::error::Result;
use crate::models::{ListPage, Metadata, ObjectKey};
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub type KeyStream<'a> = Pin<Box<dyn Stream<Item = Result<ObjectKey>> + Send + 'a>>;

/// Unified interface for object stores.
///
/// Every operation names its bucket explicitly so that a single client can
/// serve both the source and the destination of a run. All operations are
/// asynchronous; implementations must be safe to call from many tasks at
/// once through a shared [`StoreHandle`](crate::StoreHandle).
///
/// # Examples
///
/// ```
/// use downscale_storage::{ObjectKey, ObjectStore, Metadata, error::Result};
///
/// async fn copy(store: &dyn ObjectStore, from: &str, to: &str, key: &ObjectKey) -> Result<()> {
///     let data = store.get(from, key).await?;
///     store.put(to, key, data, &Metadata::new()).await
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the configured store (used for logging only).
    fn name(&self) -> &str;

    /// Fetch one page of a bucket listing.
    ///
    /// Pass `None` to start from the beginning, then the previous page's
    /// [`next_token`](ListPage::next_token) until it comes back `None`.
    /// An empty bucket is an empty page, not an error.
    async fn list_page(&self, bucket: &str, continuation: Option<&str>) -> Result<ListPage>;

    /// Stream every key in a bucket, following continuation tokens until the
    /// listing is exhausted.
    ///
    /// Keys are yielded incrementally as each page arrives. The first error
    /// ends the stream.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use downscale_storage::{ObjectStore, error::Result};
    /// # async fn example(store: &dyn ObjectStore) -> Result<()> {
    /// let mut keys = store.list_stream("photos");
    /// while let Some(key) = keys.try_next().await? {
    ///     println!("{key}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, bucket: &'a str) -> KeyStream<'a> {
        Box::pin(stream! {
            let mut token: Option<String> = None;
            loop {
                let page = match self.list_page(bucket, token.as_deref()).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        break;
                    },
                };
                for key in page.keys {
                    yield Ok(key);
                }
                match page.next_token {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }
        })
    }

    /// Collect every key in a bucket.
    ///
    /// Convenience wrapper over [`list_stream()`](Self::list_stream).
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectKey>> {
        self.list_stream(bucket).try_collect().await
    }

    /// Fetch an object's bytes.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn get(&self, bucket: &str, key: &ObjectKey) -> Result<Vec<u8>>;

    /// Upload an object, replacing any existing object under the same key.
    async fn put(&self, bucket: &str, key: &ObjectKey, data: Vec<u8>, metadata: &Metadata) -> Result<()>;
}
