//! In-memory object store for testing.

use crate::ObjectStore;
use crate::error::{ErrorKind, Result};
use crate::models::{ListPage, Metadata, ObjectKey};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Number of keys per listing page when none is configured; S3's own cap.
const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object as held by [`MockStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockObject {
    pub data: Vec<u8>,
    pub metadata: Metadata,
}

/// In-memory object store for testing.
///
/// Buckets are `BTreeMap`s behind a [`RwLock`], so listings come back in
/// lexicographic key order and every trait method can operate on `&self`.
/// Like an S3-compatible service, buckets must exist before they can be
/// listed or written to.
///
/// Beyond storage, the mock records what was asked of it (every fetched key,
/// and the peak number of fetches in flight at once) and can be told to fail
/// specific operations.
///
/// # Examples
///
/// ```
/// use downscale_storage::ObjectStore;
/// use downscale_storage::backend::MockStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockStore::default()
///     .with_objects("photos", [("a.jpg", b"jpeg".to_vec()), ("b.png", b"png".to_vec())])
///     .with_page_size(1);
///
/// let page = store.list_page("photos", None).await?;
/// assert_eq!(page.keys.len(), 1);
/// assert!(page.next_token.is_some());
/// assert_eq!(store.list("photos").await?.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct MockStore {
    name: String,
    buckets: RwLock<HashMap<String, BTreeMap<ObjectKey, MockObject>>>,
    page_size: usize,
    latency: Option<Duration>,
    failing_lists: HashSet<String>,
    failing_gets: HashSet<(String, ObjectKey)>,
    failing_puts: HashSet<(String, ObjectKey)>,
    fetched: RwLock<Vec<ObjectKey>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockStore {
    /// Create an empty bucket (no-op if it already exists).
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.get_mut().entry(bucket.into()).or_default();
        self
    }

    /// Create a bucket (if needed) and fill it with objects that carry no
    /// metadata.
    pub fn with_objects(
        mut self,
        bucket: impl Into<String>,
        objects: impl IntoIterator<Item = (impl Into<ObjectKey>, impl Into<Vec<u8>>)>,
    ) -> Self {
        let contents = self.buckets.get_mut().entry(bucket.into()).or_default();
        for (key, data) in objects {
            contents.insert(key.into(), MockObject { data: data.into(), metadata: Metadata::new() });
        }
        self
    }

    /// Limit how many keys a single listing page may hold.
    ///
    /// # Panics
    ///
    /// If `page_size` is zero; a listing could never make progress.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        assert!(page_size > 0, "MockStore::with_page_size: page size must be positive");
        self.page_size = page_size;
        self
    }

    /// Delay every fetch, so that concurrent fetches overlap in time.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every listing of `bucket` fail.
    pub fn fail_list(mut self, bucket: impl Into<String>) -> Self {
        self.failing_lists.insert(bucket.into());
        self
    }

    /// Make fetching `key` from `bucket` fail.
    pub fn fail_get(mut self, bucket: impl Into<String>, key: impl Into<ObjectKey>) -> Self {
        self.failing_gets.insert((bucket.into(), key.into()));
        self
    }

    /// Make uploading `key` to `bucket` fail.
    pub fn fail_put(mut self, bucket: impl Into<String>, key: impl Into<ObjectKey>) -> Self {
        self.failing_puts.insert((bucket.into(), key.into()));
        self
    }

    /// A copy of a stored object, if present.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<MockObject> {
        self.buckets.read().await.get(bucket).and_then(|contents| contents.get(key)).cloned()
    }

    /// Every key in a bucket, in listing order.
    pub async fn keys(&self, bucket: &str) -> Vec<ObjectKey> {
        self.buckets.read().await.get(bucket).map(|contents| contents.keys().cloned().collect()).unwrap_or_default()
    }

    /// Every key fetched so far (from any bucket), in the order the fetches
    /// started.
    pub async fn fetched(&self) -> Vec<ObjectKey> {
        self.fetched.read().await.clone()
    }

    /// Highest number of fetches that were ever in progress simultaneously.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn injected(operation: &str, bucket: &str, key: &ObjectKey) -> ErrorKind {
        ErrorKind::BackendError(format!("injected {operation} failure for {bucket}/{key}"))
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            buckets: RwLock::default(),
            page_size: DEFAULT_PAGE_SIZE,
            latency: None,
            failing_lists: HashSet::new(),
            failing_gets: HashSet::new(),
            failing_puts: HashSet::new(),
            fetched: RwLock::default(),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }
}

/// Decrements the in-flight counter however the fetch ends.
struct InFlight<'a>(&'a AtomicUsize);
impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_page(&self, bucket: &str, continuation: Option<&str>) -> Result<ListPage> {
        if self.failing_lists.contains(bucket) {
            exn::bail!(ErrorKind::Network(format!("injected list failure for {bucket}")));
        }
        let guard = self.buckets.read().await;
        let contents = guard.get(bucket).ok_or_else(|| ErrorKind::NotFound(bucket.to_string(), String::new()))?;
        // The token is simply the last key of the previous page.
        let start = match continuation {
            Some(token) => Bound::Excluded(token),
            None => Bound::Unbounded,
        };
        let mut remaining = contents.range::<str, _>((start, Bound::Unbounded)).map(|(key, _)| key);
        let keys: Vec<ObjectKey> = remaining.by_ref().take(self.page_size).cloned().collect();
        let next_token = match remaining.next() {
            Some(_) => keys.last().map(ToString::to_string),
            None => None,
        };
        Ok(ListPage { keys, next_token })
    }

    async fn get(&self, bucket: &str, key: &ObjectKey) -> Result<Vec<u8>> {
        self.fetched.write().await.push(key.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing_gets.contains(&(bucket.to_string(), key.clone())) {
            exn::bail!(Self::injected("get", bucket, key));
        }
        let guard = self.buckets.read().await;
        let object = guard
            .get(bucket)
            .and_then(|contents| contents.get(key))
            .ok_or_else(|| ErrorKind::NotFound(bucket.to_string(), key.to_string()))?;
        Ok(object.data.clone())
    }

    async fn put(&self, bucket: &str, key: &ObjectKey, data: Vec<u8>, metadata: &Metadata) -> Result<()> {
        if self.failing_puts.contains(&(bucket.to_string(), key.clone())) {
            exn::bail!(Self::injected("put", bucket, key));
        }
        let mut guard = self.buckets.write().await;
        let contents = guard.get_mut(bucket).ok_or_else(|| ErrorKind::NotFound(bucket.to_string(), key.to_string()))?;
        contents.insert(key.clone(), MockObject { data, metadata: metadata.clone() });
        Ok(())
    }
}
