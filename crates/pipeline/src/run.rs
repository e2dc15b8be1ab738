use crate::error::Result;
use crate::list::list_eligible_keys;
use crate::partition::{TaskNode, WorkItem};
use crate::scheduler::{Report, Scheduler};
use downscale_storage::StoreHandle;
use downscale_transcode::ScaleFactor;
use tracing::instrument;

/// Parameters of a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub source_bucket: String,
    pub destination_bucket: String,
    pub scale: ScaleFactor,
    /// Maximum number of leaves processed at once.
    pub workers: usize,
}

/// Down-scale every eligible image in the source bucket into the
/// destination bucket, under the same keys.
///
/// # Errors
///
/// Only a failure to list the source bucket is returned, and it is returned
/// before anything has been fetched. Failures of individual keys are in the
/// [`Report`].
#[instrument(skip_all, fields(source = %job.source_bucket, destination = %job.destination_bucket))]
pub async fn run(store: StoreHandle, job: &Job) -> Result<Report> {
    let keys = list_eligible_keys(&*store, &job.source_bucket).await?;
    if keys.is_empty() {
        tracing::info!("No images found in source bucket");
        return Ok(Report::default());
    }
    tracing::info!(count = keys.len(), scale = %job.scale, workers = job.workers, "Downscaling images");

    let root = TaskNode::partition(WorkItem::new(job.source_bucket.as_str(), job.destination_bucket.as_str(), keys));
    tracing::debug!(leaves = root.leaf_count(), depth = root.depth(), "Partitioned keys into task tree");

    let report = Scheduler::new(store, job.scale, job.workers).execute(root).await;
    tracing::info!(uploaded = report.uploaded.len(), failed = report.failed.len(), "Run complete");
    Ok(report)
}
