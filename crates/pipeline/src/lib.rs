//! Bulk down-scaling of every image in a bucket.
//!
//! A run has three phases:
//!
//! 1. **Listing** ([`list_eligible_keys`]): page through the source bucket
//!    and keep the keys whose extension names a readable image format.
//! 2. **Partitioning** ([`TaskNode::partition`]): halve the key list
//!    recursively until no piece holds more than [`LEAF_SIZE`] keys.
//! 3. **Execution** ([`Scheduler::execute`]): fork/join over the tree, with a
//!    fixed pool of worker permits bounding how many leaves run at once.
//!    Each leaf fetches, transcodes and uploads its keys one after another.
//!
//! [`run`] strings the three together. Only a listing failure stops a run;
//! every other failure is confined to its key and collected in the
//! [`Report`].

pub mod error;
mod list;
mod partition;
mod run;
mod scheduler;

pub use crate::list::{is_eligible, list_eligible_keys};
pub use crate::partition::{LEAF_SIZE, TaskNode, WorkItem};
pub use crate::run::{Job, run};
pub use crate::scheduler::{PROVENANCE_METADATA, Report, Scheduler};
