pub mod backend;
pub mod error;
mod key;
mod models;

pub use crate::backend::ObjectStore;
pub use crate::key::validate as validate_key;
pub use crate::models::{ListPage, Metadata, ObjectKey};
use std::sync::Arc;

/// Shared, thread-safe handle to a configured store. One handle is cloned
/// into every worker; implementations must tolerate concurrent callers.
pub type StoreHandle = Arc<dyn ObjectStore>;
