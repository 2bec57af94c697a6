//! Message transport seam.
//!
//! The orchestrator only needs [`MessagePublisher`]. [`WorkQueue`] is an
//! in-process topic on tokio channels that stands in for the external queue:
//! deliveries carry an attempt counter so consumers can redeliver on a
//! negative acknowledgement and dead-letter after a bounded number of tries.

mod consumer;
mod messages;

pub use consumer::{DeliveryOutcome, RequestConsumer};
pub use messages::ProcessingRequestMessage;

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::PublishError;

pub trait MessagePublisher: Send + Sync {
    fn publish(&self, message: String) -> Result<(), PublishError>;
}

/// A message handed to a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub payload: String,
    /// 1 for the first delivery, incremented on every redelivery
    pub attempt: u32,
}

/// In-process topic
#[derive(Clone)]
pub struct WorkQueue {
    topic: String,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl WorkQueue {
    pub fn new(topic: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                topic: topic.into(),
                tx,
            },
            rx,
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn publisher(&self) -> QueuePublisher {
        QueuePublisher {
            queue: self.clone(),
        }
    }

    fn send(&self, delivery: Delivery) -> Result<(), PublishError> {
        self.tx.send(delivery).map_err(|_| PublishError::Closed {
            topic: self.topic.clone(),
        })
    }

    /// Put a negatively acknowledged delivery back on the topic after `delay`.
    ///
    /// Returns `false` without redelivering once `max_deliveries` is reached;
    /// the message is dead-lettered.
    pub fn schedule_redelivery(&self, delivery: Delivery, delay: Duration, max_deliveries: u32) -> bool {
        if delivery.attempt >= max_deliveries {
            error!(
                topic = %self.topic,
                attempt = delivery.attempt,
                payload = %delivery.payload,
                "Delivery limit reached, dead-lettering message"
            );
            return false;
        }

        let queue = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let next = Delivery {
                payload: delivery.payload,
                attempt: delivery.attempt + 1,
            };
            debug!(topic = %queue.topic, attempt = next.attempt, "Redelivering message");
            if let Err(e) = queue.send(next) {
                warn!(error = %e, "Failed to redeliver message");
            }
        });
        true
    }
}

/// Publishes fresh messages (attempt 1) onto a [`WorkQueue`]
#[derive(Clone)]
pub struct QueuePublisher {
    queue: WorkQueue,
}

impl MessagePublisher for QueuePublisher {
    fn publish(&self, message: String) -> Result<(), PublishError> {
        self.queue.send(Delivery {
            payload: message,
            attempt: 1,
        })
    }
}
