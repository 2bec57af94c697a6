//! Result store gateway.
//!
//! The orchestrator persists and queries per-(document, processor) outcomes
//! through [`ResultStore`]. Durability and atomicity belong to the
//! implementation; no uniqueness is enforced on (document, processor).

use dashmap::DashMap;
use uuid::Uuid;

use crate::db::DocumentProcessorResult;
use crate::error::ServiceResult;

pub trait ResultStore: Send + Sync {
    /// Append a result row
    fn save(&self, result: &DocumentProcessorResult) -> ServiceResult<()>;

    /// All rows recorded for a document, in insertion order
    fn find_by_document_id(&self, document_id: Uuid) -> ServiceResult<Vec<DocumentProcessorResult>>;

    /// Rows for a document restricted to the given processors
    fn find_by_document_id_and_processor_ids(
        &self,
        document_id: Uuid,
        processor_ids: &[String],
    ) -> ServiceResult<Vec<DocumentProcessorResult>>;
}

/// In-memory result store
#[derive(Default)]
pub struct MemoryResultStore {
    results: DashMap<Uuid, Vec<DocumentProcessorResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows across all documents
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.results.iter().map(|entry| entry.value().len()).sum()
    }
}

impl ResultStore for MemoryResultStore {
    fn save(&self, result: &DocumentProcessorResult) -> ServiceResult<()> {
        self.results
            .entry(result.document_id)
            .or_default()
            .push(result.clone());
        Ok(())
    }

    fn find_by_document_id(&self, document_id: Uuid) -> ServiceResult<Vec<DocumentProcessorResult>> {
        Ok(self
            .results
            .get(&document_id)
            .map(|rows| rows.value().clone())
            .unwrap_or_default())
    }

    fn find_by_document_id_and_processor_ids(
        &self,
        document_id: Uuid,
        processor_ids: &[String],
    ) -> ServiceResult<Vec<DocumentProcessorResult>> {
        Ok(self
            .results
            .get(&document_id)
            .map(|rows| {
                rows.value()
                    .iter()
                    .filter(|row| processor_ids.contains(&row.processor_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
