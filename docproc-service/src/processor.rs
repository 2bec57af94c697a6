//! Pluggable document processors.
//!
//! A processor inspects a document and reports a classified outcome. The
//! orchestrator only looks processors up by id and reacts to their status;
//! extraction itself happens inside the processor (usually remotely).

mod catalog;
mod http;
mod registry;

pub use catalog::KnownProcessor;
pub use http::HttpProcessor;
pub use registry::ProcessorRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DocumentProcessorResult;
use crate::error::ProcessorError;

/// Identifier of a processor variant, as supplied by callers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorId {
    processor_id: String,
}

impl ProcessorId {
    pub fn new(processor_id: impl Into<String>) -> Self {
        Self {
            processor_id: processor_id.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.processor_id
    }
}

impl std::fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.processor_id)
    }
}

impl From<&str> for ProcessorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    fn processor_id(&self) -> &str;

    /// Run the processor once against a document.
    ///
    /// `Ok` carries the classified outcome in its status; `Err` is reserved
    /// for failures the processor could not classify.
    async fn process(&self, document_id: Uuid) -> Result<DocumentProcessorResult, ProcessorError>;
}
