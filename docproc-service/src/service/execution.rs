//! Execution path: run one processor once and classify its outcome.

use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::db::{DocumentProcessorResult, ProcessorStatus};
use crate::error::{ProcessingError, format_error_chain};
use crate::service::DocumentProcessingService;

const PROCESSOR_NOT_FOUND: &str = "processor not found";
const UNPROCESSABLE_DOCUMENT: &str = "Unprocessable document";

impl DocumentProcessingService {
    /// Run `processor_id` against a document, once.
    ///
    /// Returns the persisted `COMPLETE` result, or a [`ProcessingError`]
    /// telling the queue consumer whether the message may be redelivered.
    /// Unretryable outcomes are recorded as an `UNPROCESSABLE` row first.
    pub async fn execute_processing(
        &self,
        document_id: Uuid,
        processor_id: &str,
    ) -> Result<DocumentProcessorResult, ProcessingError> {
        let Some(processor) = self.registry.lookup(processor_id) else {
            error!(processor_id = %processor_id, doc_id = %document_id, "Processor not found");
            self.record_unprocessable(document_id, processor_id, PROCESSOR_NOT_FOUND)?;
            return Err(ProcessingError::unretryable("Processor not found"));
        };

        let mut result = processor.process(document_id).await.map_err(|e| {
            warn!(
                doc_id = %document_id,
                processor_id = %processor_id,
                error = %format_error_chain(&e),
                "Processor failed without classifying the outcome, will be retried"
            );
            ProcessingError::retryable_with_source(
                format!("Processor {} failed for document {}", processor_id, document_id),
                e,
            )
        })?;

        match &result.status {
            ProcessorStatus::Complete => {}
            ProcessorStatus::MissingDependency => {
                warn!(
                    doc_id = %document_id,
                    processor_id = %processor_id,
                    "Dependency missing for processing document, will be retried"
                );
                return Err(ProcessingError::retryable("Missing dependency"));
            }
            ProcessorStatus::Unprocessable => {
                let unretryable_message =
                    format!("An unretryable error occurred for document: {}", document_id);
                let detail = result.result.error().map(str::to_string);
                match &detail {
                    Some(detail) => error!(
                        doc_id = %document_id,
                        processor_id = %processor_id,
                        error = %detail,
                        "{}",
                        unretryable_message
                    ),
                    None => error!(
                        doc_id = %document_id,
                        processor_id = %processor_id,
                        "{}",
                        unretryable_message
                    ),
                }
                self.record_unprocessable(document_id, processor_id, UNPROCESSABLE_DOCUMENT)?;
                return Err(ProcessingError::unretryable(
                    detail.unwrap_or(unretryable_message),
                ));
            }
            other => {
                return Err(ProcessingError::retryable(format!(
                    "Document {} request could not be completed and will be retried. Status: {}",
                    document_id, other
                )));
            }
        }

        result.processor_id = processor.processor_id().to_string();

        self.store.save(&result).map_err(|e| {
            ProcessingError::retryable_with_source("Failed to persist processing result", e)
        })?;

        let payload = serde_json::to_string(&result).map_err(|e| {
            ProcessingError::retryable_with_source("Failed to serialize processing result", e)
        })?;
        self.result_publisher.publish(payload).map_err(|e| {
            ProcessingError::retryable_with_source("Failed to publish processing result", e)
        })?;

        debug!(
            doc_id = %document_id,
            processor_id = %result.processor_id,
            "Document processing result was successfully published"
        );

        Ok(result)
    }

    fn record_unprocessable(
        &self,
        document_id: Uuid,
        processor_id: &str,
        error: &str,
    ) -> Result<(), ProcessingError> {
        self.store
            .save(&DocumentProcessorResult::unprocessable(document_id, processor_id, error))
            .map_err(|e| {
                ProcessingError::retryable_with_source("Failed to record unprocessable result", e)
            })
    }
}
