use crate::error::{ErrorKind, Result};
use downscale_storage::{ObjectKey, ObjectStore};
use downscale_transcode::is_supported_extension;
use exn::ResultExt;
use futures::TryStreamExt;
use std::collections::HashSet;
use tracing::instrument;

/// Whether a key's extension names a format the transcoder can read.
///
/// Keys without any `.` are never eligible. Matching ignores case.
pub fn is_eligible(key: &ObjectKey) -> bool {
    key.extension().is_some_and(is_supported_extension)
}

/// Every key in `bucket` that [`is_eligible`], in the order the store
/// enumerates them.
///
/// Follows continuation tokens until the listing is exhausted. A key the
/// store reports more than once is kept only at its first position.
///
/// # Errors
///
/// Any listing failure is a [`Listing`](ErrorKind::Listing) error; no partial
/// result is returned.
#[instrument(skip(store), fields(store = store.name()))]
pub async fn list_eligible_keys(store: &dyn ObjectStore, bucket: &str) -> Result<Vec<ObjectKey>> {
    let mut keys = store.list_stream(bucket);
    let mut seen = HashSet::new();
    let mut eligible = Vec::new();
    let mut listed = 0usize;
    while let Some(key) = keys.try_next().await.or_raise(|| ErrorKind::Listing(bucket.to_string()))? {
        listed += 1;
        if !is_eligible(&key) {
            tracing::trace!(key = %key, "Skipping key without a supported image extension");
            continue;
        }
        if !seen.insert(key.clone()) {
            tracing::trace!(key = %key, "Skipping duplicate key");
            continue;
        }
        eligible.push(key);
    }
    tracing::debug!(listed, eligible = eligible.len(), "Listed source bucket");
    Ok(eligible)
}
