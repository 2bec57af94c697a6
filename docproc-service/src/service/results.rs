//! Result queries.

use uuid::Uuid;

use crate::db::DocumentProcessorResult;
use crate::error::ServiceResult;
use crate::processor::ProcessorId;
use crate::service::DocumentProcessingService;

impl DocumentProcessingService {
    /// All results recorded for a document, oldest first.
    ///
    /// Rows with equal timestamps keep the store's insertion order.
    pub fn get_results_for_document(
        &self,
        document_id: Uuid,
    ) -> ServiceResult<Vec<DocumentProcessorResult>> {
        let mut results = self.store.find_by_document_id(document_id)?;
        results.sort_by_key(|r| r.timestamp);
        Ok(results)
    }

    /// Results for a document restricted to some processors, in no particular order
    pub fn get_results_for_document_and_processors(
        &self,
        document_id: Uuid,
        processor_ids: &[ProcessorId],
    ) -> ServiceResult<Vec<DocumentProcessorResult>> {
        let processor_ids: Vec<String> = processor_ids
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        self.store
            .find_by_document_id_and_processor_ids(document_id, &processor_ids)
    }

    /// Record a result supplied by a caller
    pub fn save_result(&self, result: &DocumentProcessorResult) -> ServiceResult<()> {
        self.store.save(result)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use crate::db::{DocumentProcessorResult, ProcessorStatus};
    use crate::processor::ProcessorId;
    use crate::scan::ScanStatus;
    use crate::testing::TestHarness;

    fn row_at(document_id: Uuid, processor_id: &str, minutes_ago: i64) -> DocumentProcessorResult {
        let mut row = DocumentProcessorResult::pending(document_id, processor_id);
        row.timestamp = Utc::now() - Duration::minutes(minutes_ago);
        row
    }

    #[test]
    fn test_results_sorted_by_timestamp() {
        let harness = TestHarness::new(ScanStatus::Ready);
        let document_id = Uuid::new_v4();

        for (processor_id, minutes_ago) in [("c", 1), ("a", 30), ("b", 10)] {
            harness
                .service
                .save_result(&row_at(document_id, processor_id, minutes_ago))
                .unwrap();
        }

        let ids: Vec<_> = harness
            .service
            .get_results_for_document(document_id)
            .unwrap()
            .into_iter()
            .map(|r| r.processor_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let harness = TestHarness::new(ScanStatus::Ready);
        let document_id = Uuid::new_v4();
        let timestamp = Utc::now();

        for processor_id in ["z", "y", "x"] {
            let mut row = DocumentProcessorResult::pending(document_id, processor_id);
            row.timestamp = timestamp;
            harness.service.save_result(&row).unwrap();
        }

        let first: Vec<_> = harness
            .service
            .get_results_for_document(document_id)
            .unwrap()
            .into_iter()
            .map(|r| r.processor_id)
            .collect();
        let second: Vec<_> = harness
            .service
            .get_results_for_document(document_id)
            .unwrap()
            .into_iter()
            .map(|r| r.processor_id)
            .collect();
        assert_eq!(first, vec!["z", "y", "x"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_results_for_processors() {
        let harness = TestHarness::new(ScanStatus::Ready);
        let document_id = Uuid::new_v4();

        harness.service.save_result(&row_at(document_id, "a", 2)).unwrap();
        let mut complete = row_at(document_id, "b", 1);
        complete.status = ProcessorStatus::Complete;
        harness.service.save_result(&complete).unwrap();

        let rows = harness
            .service
            .get_results_for_document_and_processors(document_id, &[ProcessorId::new("b")])
            .unwrap();
        assert_eq!(rows, vec![complete]);
    }
}
