//! Enqueue path: dedup, scan gate, publish and record PENDING rows.

use tracing::{debug, info};
use uuid::Uuid;

use crate::db::DocumentProcessorResult;
use crate::error::{ServiceError, ServiceResult};
use crate::processor::ProcessorId;
use crate::queue::ProcessingRequestMessage;
use crate::scan::ScanStatus;
use crate::service::DocumentProcessingService;

impl DocumentProcessingService {
    /// Enqueue a document for the given processors.
    ///
    /// Unless `reprocess` is set, processors that already have any recorded
    /// result for the document are skipped. Fails with `NotAvailable` when
    /// the document failed its scan, before anything is published.
    pub async fn initiate_processing(
        &self,
        document_id: Uuid,
        processor_ids: Vec<ProcessorId>,
        reprocess: bool,
    ) -> ServiceResult<()> {
        let processor_ids = self.filter_already_processed(document_id, processor_ids, reprocess)?;

        if processor_ids.is_empty() {
            debug!(doc_id = %document_id, "Nothing to enqueue");
            return Ok(());
        }

        let status = self.scan_status.get_status(document_id).await?;
        if status == ScanStatus::FailedScan {
            info!(doc_id = %document_id, "Rejecting processing request for quarantined document");
            return Err(ServiceError::NotAvailable {
                message: status.message().to_string(),
            });
        }

        debug!(doc_id = %document_id, "Enqueuing processing request");
        self.enqueue_processing_requests(document_id, &processor_ids)
    }

    /// Drop processors that already have a recorded result, unless reprocessing.
    ///
    /// Any existing row suppresses the processor, whatever its status. A
    /// processor that failed before is only retried with `reprocess`.
    pub fn filter_already_processed(
        &self,
        document_id: Uuid,
        processor_ids: Vec<ProcessorId>,
        reprocess: bool,
    ) -> ServiceResult<Vec<ProcessorId>> {
        if reprocess {
            return Ok(processor_ids);
        }

        let requested: Vec<String> = processor_ids
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        let existing = self
            .store
            .find_by_document_id_and_processor_ids(document_id, &requested)?;

        if !existing.is_empty() {
            let mut processed: Vec<&str> = existing.iter().map(|r| r.processor_id.as_str()).collect();
            processed.sort_unstable();
            processed.dedup();
            let unfinished = existing.iter().filter(|r| !r.status.is_terminal()).count();
            info!(
                doc_id = %document_id,
                processors = ?processed,
                unfinished,
                "Document already processed by these processors, request discarded for them"
            );
        }

        Ok(processor_ids
            .into_iter()
            .filter(|id| !existing.iter().any(|r| r.processor_id == id.as_str()))
            .collect())
    }

    /// Publish one request per processor and record a PENDING row for each.
    ///
    /// Stops at the first failure; messages published before it stay published.
    pub fn enqueue_processing_requests(
        &self,
        document_id: Uuid,
        processor_ids: &[ProcessorId],
    ) -> ServiceResult<()> {
        for processor_id in processor_ids {
            let message = ProcessingRequestMessage::new(document_id, processor_id.clone())
                .encode()
                .map_err(|_| ServiceError::BadInput {
                    message: format!("The message with id {} could not be enqueued", document_id),
                })?;

            self.request_publisher.publish(message)?;

            self.store
                .save(&DocumentProcessorResult::pending(document_id, processor_id.as_str()))?;

            debug!(doc_id = %document_id, processor_id = %processor_id, "Published processing request");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    use crate::db::{DocumentProcessorResult, ProcessorStatus, ResultPayload};
    use crate::error::ServiceError;
    use crate::processor::ProcessorId;
    use crate::queue::ProcessingRequestMessage;
    use crate::scan::ScanStatus;
    use crate::store::ResultStore;
    use crate::testing::{ClosedPublisher, TestHarness};

    fn ids(values: &[&str]) -> Vec<ProcessorId> {
        values.iter().copied().map(ProcessorId::from).collect()
    }

    #[tokio::test]
    async fn test_fresh_document_enqueues_every_processor() {
        let harness = TestHarness::new(ScanStatus::Ready);
        let document_id = Uuid::new_v4();

        assert_ok!(
            harness
                .service
                .initiate_processing(document_id, ids(&["A", "B"]), false)
                .await
        );

        let messages = harness.requests.messages();
        assert_eq!(messages.len(), 2);
        let decoded: Vec<_> = messages
            .iter()
            .map(|m| ProcessingRequestMessage::decode(m).unwrap())
            .collect();
        assert_eq!(decoded[0], ProcessingRequestMessage::new(document_id, "A".into()));
        assert_eq!(decoded[1], ProcessingRequestMessage::new(document_id, "B".into()));

        let rows = harness.store.find_by_document_id(document_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.status == ProcessorStatus::Pending));
        assert!(rows.iter().all(|r| r.result.is_empty()));
    }

    #[tokio::test]
    async fn test_existing_result_suppresses_processor() {
        let harness = TestHarness::new(ScanStatus::Ready);
        let document_id = Uuid::new_v4();
        harness
            .store
            .save(&DocumentProcessorResult::complete(document_id, "A", ResultPayload::empty()))
            .unwrap();

        let remaining = harness
            .service
            .filter_already_processed(document_id, ids(&["A", "B"]), false)
            .unwrap();
        assert_eq!(remaining, ids(&["B"]));

        harness
            .service
            .initiate_processing(document_id, ids(&["A", "B"]), false)
            .await
            .unwrap();

        let messages = harness.requests.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            ProcessingRequestMessage::decode(&messages[0]).unwrap().request,
            ProcessorId::new("B")
        );
    }

    #[tokio::test]
    async fn test_failed_results_also_suppress_without_reprocess() {
        let harness = TestHarness::new(ScanStatus::Ready);
        let document_id = Uuid::new_v4();
        harness
            .store
            .save(&DocumentProcessorResult::unprocessable(document_id, "A", "Unprocessable document"))
            .unwrap();

        harness
            .service
            .initiate_processing(document_id, ids(&["A"]), false)
            .await
            .unwrap();

        assert!(harness.requests.messages().is_empty());
    }

    #[tokio::test]
    async fn test_second_identical_request_is_idempotent() {
        let harness = TestHarness::new(ScanStatus::Ready);
        let document_id = Uuid::new_v4();

        for _ in 0..2 {
            harness
                .service
                .initiate_processing(document_id, ids(&["A", "B"]), false)
                .await
                .unwrap();
        }

        assert_eq!(harness.requests.messages().len(), 2);
        assert_eq!(harness.store.find_by_document_id(document_id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reprocess_bypasses_dedup() {
        let harness = TestHarness::new(ScanStatus::Ready);
        let document_id = Uuid::new_v4();

        harness
            .service
            .initiate_processing(document_id, ids(&["A", "B"]), false)
            .await
            .unwrap();
        harness
            .service
            .initiate_processing(document_id, ids(&["A", "B"]), true)
            .await
            .unwrap();

        assert_eq!(harness.requests.messages().len(), 4);
        assert_eq!(harness.store.find_by_document_id(document_id).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_scan_rejects_without_side_effects() {
        let harness = TestHarness::new(ScanStatus::FailedScan);
        let document_id = Uuid::new_v4();

        let err = assert_err!(
            harness
                .service
                .initiate_processing(document_id, ids(&["A", "B"]), false)
                .await
        );

        assert!(matches!(err, ServiceError::NotAvailable { .. }));
        assert!(harness.requests.messages().is_empty());
        assert_eq!(harness.store.len(), 0);
    }

    #[tokio::test]
    async fn test_scan_not_consulted_when_nothing_to_enqueue() {
        let harness = TestHarness::new(ScanStatus::FailedScan);
        let document_id = Uuid::new_v4();
        harness
            .store
            .save(&DocumentProcessorResult::pending(document_id, "A"))
            .unwrap();

        assert_ok!(
            harness
                .service
                .initiate_processing(document_id, ids(&["A"]), false)
                .await
        );
    }

    #[tokio::test]
    async fn test_publish_failure_writes_no_pending_row() {
        let harness = TestHarness::with_request_publisher(ScanStatus::Ready, Arc::new(ClosedPublisher));
        let document_id = Uuid::new_v4();

        let err = harness
            .service
            .initiate_processing(document_id, ids(&["A", "B"]), false)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Publish(_)));
        assert_eq!(harness.store.len(), 0);
    }
}
