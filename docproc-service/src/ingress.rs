//! Line-oriented command ingress.
//!
//! Every input line is one JSON command tagged by `command`:
//! - `initiate`: an initiate-processing event, forwarded to the event topic
//! - `results`: result query for a document, optionally limited to processors
//! - `record`: a result row to store as-is
//!
//! Each command is answered with a single JSON line.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::DocumentProcessorResult;
use crate::error::{ServiceResult, format_error_chain};
use crate::events::InitiateProcessingEvent;
use crate::processor::ProcessorId;
use crate::queue::MessagePublisher;
use crate::service::DocumentProcessingService;

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum IngressCommand {
    Initiate(InitiateProcessingEvent),
    #[serde(rename_all = "camelCase")]
    Results {
        document_id: Uuid,
        #[serde(default)]
        processor_ids: Option<Vec<ProcessorId>>,
    },
    Record(DocumentProcessorResult),
}

pub struct Ingress {
    service: Arc<DocumentProcessingService>,
    events: Arc<dyn MessagePublisher>,
}

impl Ingress {
    pub fn new(service: Arc<DocumentProcessingService>, events: Arc<dyn MessagePublisher>) -> Self {
        Self { service, events }
    }

    /// Answer commands until `shutdown` fires or the line source closes
    pub async fn run<W>(
        &self,
        mut lines: mpsc::UnboundedReceiver<String>,
        mut writer: W,
        shutdown: CancellationToken,
    ) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        info!("Command ingress started");

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.recv() => match line {
                    Some(line) => line,
                    None => break,
                },
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let reply = self.handle_line(line);
            writer.write_all(reply.to_string().as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        info!("Command ingress stopped");
        Ok(())
    }

    /// Execute one command line and build its reply
    pub fn handle_line(&self, line: &str) -> serde_json::Value {
        let command: IngressCommand = match serde_json::from_str(line) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed command");
                return json!({ "error": format_error_chain(&e) });
            }
        };

        self.execute(command).unwrap_or_else(|e| {
            error!(error = %format_error_chain(&e), "Command failed");
            json!({ "error": format_error_chain(&e) })
        })
    }

    fn execute(&self, command: IngressCommand) -> ServiceResult<serde_json::Value> {
        match command {
            IngressCommand::Initiate(event) => {
                let event_id = event.metadata.id;
                self.events.publish(serde_json::to_string(&event)?)?;
                debug!(event_id = %event_id, doc_id = %event.document_id, "Initiate event accepted");
                Ok(json!({ "accepted": event_id }))
            }
            IngressCommand::Results {
                document_id,
                processor_ids,
            } => {
                let results = match processor_ids {
                    Some(processor_ids) => self
                        .service
                        .get_results_for_document_and_processors(document_id, &processor_ids)?,
                    None => self.service.get_results_for_document(document_id)?,
                };
                Ok(json!({ "results": serde_json::to_value(results)? }))
            }
            IngressCommand::Record(result) => {
                self.service.save_result(&result)?;
                Ok(json!({ "recorded": true }))
            }
        }
    }
}
