//! Consumer that drives processor execution from the work queue.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{Delivery, ProcessingRequestMessage, WorkQueue};
use crate::config::QueueConfig;
use crate::db::DocumentProcessorResult;
use crate::error::{FailureKind, ProcessingError, format_error_chain};
use crate::service::DocumentProcessingService;

/// What the consumer tells the transport about a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Remove the message from the queue
    Ack,
    /// Leave the message to be redelivered
    Nack,
}

/// Map an execution result onto the transport's acknowledgement semantics
pub fn outcome_for(result: &Result<DocumentProcessorResult, ProcessingError>) -> DeliveryOutcome {
    match result {
        Ok(_) => DeliveryOutcome::Ack,
        Err(e) => match e.kind() {
            FailureKind::Unretryable => DeliveryOutcome::Ack,
            FailureKind::Retryable => DeliveryOutcome::Nack,
        },
    }
}

pub struct RequestConsumer {
    service: Arc<DocumentProcessingService>,
    queue: WorkQueue,
    config: QueueConfig,
}

impl RequestConsumer {
    pub fn new(service: Arc<DocumentProcessingService>, queue: WorkQueue, config: QueueConfig) -> Self {
        Self {
            service,
            queue,
            config,
        }
    }

    /// Consume deliveries until `shutdown` fires or the topic closes.
    ///
    /// Each delivery runs as its own task; at most `queue.workers` run at once.
    /// Deliveries already taken off the topic are finished before returning.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Delivery>, shutdown: CancellationToken) {
        let permits = Arc::new(Semaphore::new(self.config.worker_permits()));
        let mut tasks = JoinSet::new();
        info!(topic = %self.queue.topic(), workers = permits.available_permits(), "Processing request consumer started");

        loop {
            let delivery = tokio::select! {
                _ = shutdown.cancelled() => break,
                delivery = rx.recv() => match delivery {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            // Permits come back as in-flight tasks finish
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };

            let consumer = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                consumer.handle_delivery(delivery).await
            });

            while let Some(joined) = tasks.try_join_next() {
                log_join_failure(joined);
            }
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Waiting for in-flight deliveries");
        }
        while let Some(joined) = tasks.join_next().await {
            log_join_failure(joined);
        }

        info!(topic = %self.queue.topic(), "Processing request consumer stopped");
    }

    /// Execute one delivery and acknowledge or redeliver it
    pub async fn handle_delivery(&self, delivery: Delivery) -> DeliveryOutcome {
        let message = match ProcessingRequestMessage::decode(&delivery.payload) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, payload = %delivery.payload, "Dropping undecodable processing request");
                return DeliveryOutcome::Ack;
            }
        };

        let document_id = message.document_id;
        let processor_id = message.request.as_str();
        let result = self.service.execute_processing(document_id, processor_id).await;
        let outcome = outcome_for(&result);

        match &result {
            Ok(_) => {
                info!(doc_id = %document_id, processor_id = %processor_id, "Document processing completed");
            }
            Err(e) if outcome == DeliveryOutcome::Ack => {
                error!(
                    doc_id = %document_id,
                    processor_id = %processor_id,
                    error = %e,
                    "Document processing failed permanently"
                );
            }
            Err(e) => {
                warn!(
                    doc_id = %document_id,
                    processor_id = %processor_id,
                    attempt = delivery.attempt,
                    error = %format_error_chain(e),
                    "Document processing will be retried"
                );
                self.queue.schedule_redelivery(
                    delivery,
                    self.config.redelivery_delay(),
                    self.config.max_deliveries,
                );
            }
        }

        outcome
    }
}

fn log_join_failure(joined: Result<DeliveryOutcome, JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Delivery task failed");
    }
}
