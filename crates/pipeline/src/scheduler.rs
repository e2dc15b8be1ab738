//! Bounded parallel execution of a task tree.
//!
//! Internal nodes fork: the left subtree is spawned onto the runtime as an
//! independent task, the right subtree runs inline, and the node completes
//! once both have. Leaves wait for one of a fixed number of worker permits
//! before touching the store, so at most `max_parallelism` leaves (and
//! therefore store operations) are ever in flight, however wide the tree.

use crate::error::{Error, ErrorKind, Result};
use crate::partition::{TaskNode, WorkItem};
use downscale_storage::{Metadata, ObjectKey, StoreHandle};
use downscale_transcode::{ScaleFactor, transcode};
use exn::ResultExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::instrument;

/// Metadata entry attached to every uploaded object.
pub const PROVENANCE_METADATA: (&str, &str) = ("downscale-origin", "downscale");

/// Outcome of executing a task tree.
#[derive(Debug, Default)]
pub struct Report {
    /// Keys written to the destination bucket.
    pub uploaded: Vec<ObjectKey>,
    /// Keys that could not be processed, each with the reason.
    pub failed: Vec<(ObjectKey, Error)>,
}

impl Report {
    /// Combine the outcomes of two subtrees.
    #[must_use]
    pub fn merge(mut self, other: Report) -> Report {
        self.uploaded.extend(other.uploaded);
        self.failed.extend(other.failed);
        self
    }

    /// Number of keys attempted, successful or not.
    pub fn processed(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Inner {
    store: StoreHandle,
    scale: ScaleFactor,
    permits: Semaphore,
    metadata: Metadata,
}

/// Executes task trees against a shared store.
///
/// Cheap to clone; every clone shares the same worker permits.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// A `max_parallelism` of zero is treated as one.
    pub fn new(store: StoreHandle, scale: ScaleFactor, max_parallelism: usize) -> Self {
        let metadata = Metadata::from([(PROVENANCE_METADATA.0.to_string(), PROVENANCE_METADATA.1.to_string())]);
        Self {
            inner: Arc::new(Inner { store, scale, permits: Semaphore::new(max_parallelism.max(1)), metadata }),
        }
    }

    /// Run every leaf of `root`, resolving once all of them have finished.
    ///
    /// Per-key failures never abort the run; they are logged and collected
    /// into the returned [`Report`].
    pub async fn execute(&self, root: TaskNode) -> Report {
        self.clone().run_node(root).await
    }

    fn run_node(self, node: TaskNode) -> BoxFuture<'static, Report> {
        Box::pin(async move {
            match node {
                TaskNode::Leaf(item) => self.run_leaf(item).await,
                TaskNode::Split { left, right } => {
                    let forked = tokio::spawn(self.clone().run_node(*left));
                    let right = self.run_node(*right).await;
                    let left = match forked.await {
                        Ok(report) => report,
                        // Panics are contained per key; anything reaching this
                        // point is a bug in the scheduler itself.
                        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                        Err(e) => {
                            tracing::error!(error = %e, "Subtree was cancelled before completing");
                            Report::default()
                        },
                    };
                    left.merge(right)
                },
            }
        })
    }

    #[instrument(skip_all, fields(keys = item.len()))]
    async fn run_leaf(&self, item: WorkItem) -> Report {
        // unwrap is safe: semaphore is never closed
        let _permit = self.inner.permits.acquire().await.unwrap();
        let mut report = Report::default();
        for key in item.keys() {
            match self.process_key(item.source_bucket(), item.destination_bucket(), key).await {
                Ok(()) => report.uploaded.push(key.clone()),
                Err(err) => {
                    tracing::warn!(key = %key, error = ?err, "Failed to downscale object");
                    report.failed.push((key.clone(), err));
                },
            }
        }
        report
    }

    /// Fetch, transcode and upload a single key.
    #[instrument(skip(self, key), fields(key = %key))]
    async fn process_key(&self, source: &str, destination: &str, key: &ObjectKey) -> Result<()> {
        let original = self.inner.store.get(source, key).await.or_raise(|| ErrorKind::Fetch)?;
        let scale = self.inner.scale;
        let scaled = tokio::task::spawn_blocking(move || transcode(&original, scale))
            .await
            .or_raise(|| ErrorKind::Transcode)?
            .or_raise(|| ErrorKind::Transcode)?;
        tracing::debug!(
            format = ?scaled.format,
            frames = scaled.frames,
            width = scaled.width,
            height = scaled.height,
            bytes = scaled.data.len(),
            "Uploading scaled object"
        );
        self.inner.store.put(destination, key, scaled.data, &self.inner.metadata).await.or_raise(|| ErrorKind::Upload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downscale_storage::backend::MockStore;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(width, height).write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn tree(keys: &[&str]) -> TaskNode {
        TaskNode::partition(WorkItem::new("src", "dst", keys.iter().copied().map(ObjectKey::from).collect()))
    }

    #[test]
    fn test_report_merge() {
        let left = Report { uploaded: vec![ObjectKey::from("a")], failed: vec![] };
        let right = Report {
            uploaded: vec![ObjectKey::from("b")],
            failed: vec![(ObjectKey::from("c"), exn::Exn::from(ErrorKind::Fetch))],
        };
        let merged = left.merge(right);
        assert_eq!(merged.uploaded, vec![ObjectKey::from("a"), ObjectKey::from("b")]);
        assert_eq!(merged.processed(), 3);
        assert!(!merged.is_success());
    }

    #[tokio::test]
    async fn test_empty_tree() {
        let store = Arc::new(MockStore::default().with_bucket("src").with_bucket("dst"));
        let report = Scheduler::new(store.clone(), ScaleFactor::HALF, 4).execute(tree(&[])).await;
        assert_eq!(report.processed(), 0);
        assert!(store.fetched().await.is_empty());
    }

    #[tokio::test]
    async fn test_every_key_is_uploaded_with_provenance() {
        let keys = ["a.png", "b.png", "c.png", "d.png", "e.png"];
        let store =
            Arc::new(MockStore::default().with_objects("src", keys.map(|key| (key, png(8, 6)))).with_bucket("dst"));
        let mut report = Scheduler::new(store.clone(), ScaleFactor::HALF, 2).execute(tree(&keys)).await;

        assert!(report.is_success());
        report.uploaded.sort();
        assert_eq!(report.uploaded, keys.map(ObjectKey::from).to_vec());
        for key in keys {
            let object = store.object("dst", key).await.unwrap();
            assert_eq!(object.metadata.get(PROVENANCE_METADATA.0).map(String::as_str), Some(PROVENANCE_METADATA.1));
            let scaled = image::load_from_memory(&object.data).unwrap();
            assert_eq!((scaled.width(), scaled.height()), (4, 3));
        }
    }

    #[tokio::test]
    async fn test_failures_are_isolated_within_a_leaf() {
        let store = Arc::new(
            MockStore::default()
                .with_objects("src", [("a.png", b"definitely not a png".to_vec()), ("b.png", png(4, 4))])
                .with_bucket("dst"),
        );
        let report = Scheduler::new(store.clone(), ScaleFactor::HALF, 1).execute(tree(&["a.png", "b.png"])).await;

        assert_eq!(report.uploaded, vec![ObjectKey::from("b.png")]);
        assert_eq!(report.failed.len(), 1);
        let (key, err) = &report.failed[0];
        assert_eq!(key, &ObjectKey::from("a.png"));
        assert_eq!(&**err, &ErrorKind::Transcode);
        assert!(store.object("dst", "a.png").await.is_none());
        assert!(store.object("dst", "b.png").await.is_some());
    }

    #[tokio::test]
    async fn test_store_failures_are_classified() {
        let store = Arc::new(
            MockStore::default()
                .with_objects("src", [("a.png", png(2, 2)), ("b.png", png(2, 2)), ("c.png", png(2, 2))])
                .with_bucket("dst")
                .fail_get("src", "a.png")
                .fail_put("dst", "b.png"),
        );
        let report =
            Scheduler::new(store.clone(), ScaleFactor::HALF, 4).execute(tree(&["a.png", "b.png", "c.png"])).await;

        assert_eq!(report.uploaded, vec![ObjectKey::from("c.png")]);
        let mut failures: Vec<(&str, ErrorKind)> =
            report.failed.iter().map(|(key, err)| (key.as_str(), (**err).clone())).collect();
        failures.sort_by_key(|(key, _)| *key);
        assert_eq!(failures, vec![("a.png", ErrorKind::Fetch), ("b.png", ErrorKind::Upload)]);
    }
}
