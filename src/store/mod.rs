mod json;
mod mongo;

use std::collections::HashSet;
use std::future::Future;

pub use json::JsonSink;
pub use mongo::{MongoSink, StoreSettings};

use crate::error::Result;
use crate::record::BuildRecord;

/// Destination for harvested build records.
///
/// Records are keyed by job name and build number; storing a record for a
/// key that already exists replaces it.
pub trait BuildSink: Send + Sync {
    /// Readies the sink for writes, e.g. by creating indexes.
    fn prepare(&self) -> impl Future<Output = Result<()>> + Send;

    /// Build numbers of `job` that are already stored.
    fn existing_builds(&self, job: &str) -> impl Future<Output = Result<HashSet<u32>>> + Send;

    fn upsert(&self, record: &BuildRecord) -> impl Future<Output = Result<()>> + Send;
}
