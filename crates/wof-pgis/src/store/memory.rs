use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{RecordSink, WofRecord};
use crate::error::IndexResult;

/// In-memory sink keyed by record id, with last-write-wins semantics
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<HashMap<i64, WofRecord>>>,
    writes: Arc<Mutex<u64>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Option<WofRecord> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Number of distinct rows
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of upserts performed, including overwrites
    pub fn writes(&self) -> u64 {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn upsert(&self, record: &WofRecord) -> IndexResult<()> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id, record.clone());
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::test_support::record;

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let sink = MemorySink::new();
        sink.upsert(&record(1, 10)).await.unwrap();
        sink.upsert(&record(1, 20)).await.unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.writes(), 2);
        assert_eq!(sink.get(1).unwrap().parent_id, 20);
    }
}
