use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::BuildSink;
use crate::error::Result;
use crate::record::BuildRecord;

type RecordMap = BTreeMap<(String, u32), BuildRecord>;

/// In-memory sink used for dry runs; records can be written out as JSON
/// once the harvest is done.
#[derive(Debug, Default)]
pub struct JsonSink {
    records: Mutex<RecordMap>,
}

impl JsonSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored records ordered by job name, then build number.
    pub fn records(&self) -> Vec<BuildRecord> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, RecordMap> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BuildSink for JsonSink {
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    async fn existing_builds(&self, job: &str) -> Result<HashSet<u32>> {
        Ok(self
            .lock()
            .keys()
            .filter(|(name, _)| name == job)
            .map(|(_, number)| *number)
            .collect())
    }

    async fn upsert(&self, record: &BuildRecord) -> Result<()> {
        self.lock().insert(
            (record.job_name.clone(), record.build_number),
            record.clone(),
        );
        Ok(())
    }
}
