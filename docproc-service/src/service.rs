//! Document processing orchestration.
//!
//! This module coordinates a document's trip through its processors:
//! - Enqueue, with dedup against recorded results and the scan gate
//! - Execution of a single processor per delivered message
//! - Result queries

mod enqueue;
mod execution;
mod results;

use std::sync::Arc;

use crate::processor::ProcessorRegistry;
use crate::queue::MessagePublisher;
use crate::scan::ScanStatusProvider;
use crate::store::ResultStore;

/// Orchestrator for document processing.
///
/// Every collaborator is handed in at construction; the service holds no
/// mutable state of its own.
pub struct DocumentProcessingService {
    registry: Arc<ProcessorRegistry>,
    store: Arc<dyn ResultStore>,
    scan_status: Arc<dyn ScanStatusProvider>,
    request_publisher: Arc<dyn MessagePublisher>,
    result_publisher: Arc<dyn MessagePublisher>,
}

impl DocumentProcessingService {
    pub fn new(
        registry: Arc<ProcessorRegistry>,
        store: Arc<dyn ResultStore>,
        scan_status: Arc<dyn ScanStatusProvider>,
        request_publisher: Arc<dyn MessagePublisher>,
        result_publisher: Arc<dyn MessagePublisher>,
    ) -> Self {
        Self {
            registry,
            store,
            scan_status,
            request_publisher,
            result_publisher,
        }
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }
}
