//! Event subscription layer.
//!
//! Upstream services announce new documents with an initiate-processing
//! event; handling one enqueues the listed processors without reprocessing,
//! so a replayed event does not enqueue twice.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::{EventProcessingError, ServiceError, format_error_chain};
use crate::processor::ProcessorId;
use crate::queue::{Delivery, DeliveryOutcome, WorkQueue};
use crate::service::DocumentProcessingService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateProcessingEvent {
    pub metadata: EventMetadata,
    pub document_id: Uuid,
    pub processor_ids: Vec<ProcessorId>,
}

pub struct InitiateProcessingHandler {
    service: Arc<DocumentProcessingService>,
}

impl InitiateProcessingHandler {
    pub fn new(service: Arc<DocumentProcessingService>) -> Self {
        Self { service }
    }

    pub async fn handle(&self, event: InitiateProcessingEvent) -> Result<(), EventProcessingError> {
        debug!(
            event_id = %event.metadata.id,
            event_type = %event.metadata.event_type,
            "Received event"
        );

        self.service
            .initiate_processing(event.document_id, event.processor_ids, false)
            .await
            .map_err(|e| {
                error!(
                    event_id = %event.metadata.id,
                    doc_id = %event.document_id,
                    error = %format_error_chain(&e),
                    "Error processing document"
                );
                EventProcessingError {
                    event_id: event.metadata.id.to_string(),
                    source: e,
                }
            })
    }
}

/// Whether a failed event could succeed on a later delivery
fn is_transient(error: &ServiceError) -> bool {
    matches!(
        error,
        ServiceError::Database(_) | ServiceError::Publish(_) | ServiceError::ScanStatus(_)
    )
}

/// Consumer for the initiate-processing topic
pub struct EventConsumer {
    handler: InitiateProcessingHandler,
    queue: WorkQueue,
    config: QueueConfig,
}

impl EventConsumer {
    pub fn new(handler: InitiateProcessingHandler, queue: WorkQueue, config: QueueConfig) -> Self {
        Self {
            handler,
            queue,
            config,
        }
    }

    /// Handle events one at a time until `shutdown` fires or the topic closes
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<Delivery>, shutdown: CancellationToken) {
        info!(topic = %self.queue.topic(), "Event consumer started");

        loop {
            let delivery = tokio::select! {
                _ = shutdown.cancelled() => break,
                delivery = rx.recv() => match delivery {
                    Some(delivery) => delivery,
                    None => break,
                },
            };
            self.handle_delivery(delivery).await;
        }

        info!(topic = %self.queue.topic(), "Event consumer stopped");
    }

    pub async fn handle_delivery(&self, delivery: Delivery) -> DeliveryOutcome {
        let event: InitiateProcessingEvent = match serde_json::from_str(&delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, payload = %delivery.payload, "Dropping undecodable event");
                return DeliveryOutcome::Ack;
            }
        };

        match self.handler.handle(event).await {
            Ok(()) => DeliveryOutcome::Ack,
            Err(e) if is_transient(&e.source) => {
                warn!(event_id = %e.event_id, attempt = delivery.attempt, "Event will be retried");
                self.queue.schedule_redelivery(
                    delivery,
                    self.config.redelivery_delay(),
                    self.config.max_deliveries,
                );
                DeliveryOutcome::Nack
            }
            Err(_) => DeliveryOutcome::Ack,
        }
    }
}
