//! Wire format of work queue messages.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::processor::ProcessorId;

/// Request to run one processor against one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRequestMessage {
    pub request: ProcessorId,
    pub document_id: Uuid,
}

impl ProcessingRequestMessage {
    pub fn new(document_id: Uuid, request: ProcessorId) -> Self {
        Self {
            request,
            document_id,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
