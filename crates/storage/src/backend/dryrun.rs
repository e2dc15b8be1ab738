//! Dry-run object store.
//!
//! Wraps another store and prevents uploads from executing, while still
//! reporting success so that a run can be rehearsed end to end against real
//! source data.

use async_trait::async_trait;

use crate::backend::KeyStream;
use crate::error::Result;
use crate::models::{ListPage, Metadata, ObjectKey};
use crate::{ObjectStore, StoreHandle};

/// Dry-run object store.
///
/// Listing and fetching pass straight through to the inner store; every
/// upload is dropped, logging an [`info event`](tracing::Event) instead.
#[derive(Clone)]
pub struct DryRunStore {
    inner: StoreHandle,
}
impl DryRunStore {
    pub fn new(inner: StoreHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ObjectStore for DryRunStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_page(&self, bucket: &str, continuation: Option<&str>) -> Result<ListPage> {
        self.inner.list_page(bucket, continuation).await
    }

    fn list_stream<'a>(&'a self, bucket: &'a str) -> KeyStream<'a> {
        self.inner.list_stream(bucket)
    }

    async fn get(&self, bucket: &str, key: &ObjectKey) -> Result<Vec<u8>> {
        self.inner.get(bucket, key).await
    }

    async fn put(&self, bucket: &str, key: &ObjectKey, data: Vec<u8>, _metadata: &Metadata) -> Result<()> {
        tracing::info!(bucket, key = %key, bytes = data.len(), "Skipping upload during dry run");
        Ok(())
    }
}
