//! Database model structs.
//!
//! This module contains the per-(document, processor) result record and the
//! status values it moves through.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a single processing attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessorStatus {
    /// Enqueued, not yet executed
    Pending,
    /// Processor produced an authoritative result
    Complete,
    /// Processor determined the document cannot be processed
    Unprocessable,
    /// Processor needs an input that is not available yet
    MissingDependency,
    /// Any other value a processor reports
    Other(String),
}

impl ProcessorStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ProcessorStatus::Pending => "PENDING",
            ProcessorStatus::Complete => "COMPLETE",
            ProcessorStatus::Unprocessable => "UNPROCESSABLE",
            ProcessorStatus::MissingDependency => "MISSING_DEPENDENCY",
            ProcessorStatus::Other(value) => value,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "PENDING" => ProcessorStatus::Pending,
            "COMPLETE" => ProcessorStatus::Complete,
            "UNPROCESSABLE" => ProcessorStatus::Unprocessable,
            "MISSING_DEPENDENCY" => ProcessorStatus::MissingDependency,
            other => ProcessorStatus::Other(other.to_string()),
        }
    }

    /// `COMPLETE` and `UNPROCESSABLE` are never revisited without a reprocess request
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessorStatus::Complete | ProcessorStatus::Unprocessable
        )
    }
}

impl std::fmt::Display for ProcessorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ProcessorStatus {
    fn from(value: String) -> Self {
        ProcessorStatus::from_str(&value)
    }
}

impl From<ProcessorStatus> for String {
    fn from(value: ProcessorStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Result payload of a processing attempt.
///
/// The payload is owned by the processor and stays an open key/value mapping;
/// the orchestrator only reads a string `error` entry off `UNPROCESSABLE`
/// results and leaves every other value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultPayload {
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ResultPayload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("error".to_string(), serde_json::Value::String(error.into()));
        Self { fields }
    }

    /// The `error` entry, when it is a string
    pub fn error(&self) -> Option<&str> {
        self.fields.get("error").and_then(serde_json::Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Persisted outcome of running one processor against one document.
///
/// A (document, processor) pair may have several rows; the most recent by
/// timestamp is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentProcessorResult {
    pub document_id: Uuid,
    pub processor_id: String,
    pub status: ProcessorStatus,
    #[serde(default)]
    pub result: ResultPayload,
    pub timestamp: DateTime<Utc>,
}

impl DocumentProcessorResult {
    pub fn pending(document_id: Uuid, processor_id: impl Into<String>) -> Self {
        Self {
            document_id,
            processor_id: processor_id.into(),
            status: ProcessorStatus::Pending,
            result: ResultPayload::empty(),
            timestamp: Utc::now(),
        }
    }

    pub fn unprocessable(
        document_id: Uuid,
        processor_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            document_id,
            processor_id: processor_id.into(),
            status: ProcessorStatus::Unprocessable,
            result: ResultPayload::with_error(error),
            timestamp: Utc::now(),
        }
    }

    pub fn complete(
        document_id: Uuid,
        processor_id: impl Into<String>,
        result: ResultPayload,
    ) -> Self {
        Self {
            document_id,
            processor_id: processor_id.into(),
            status: ProcessorStatus::Complete,
            result,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let document_id_str: String = row.get(0)?;
        let processor_id: String = row.get(1)?;
        let status_str: String = row.get(2)?;
        let result_str: String = row.get(3)?;
        let timestamp_str: String = row.get(4)?;

        let document_id = Uuid::parse_str(&document_id_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let result = serde_json::from_str(&result_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(Self {
            document_id,
            processor_id,
            status: ProcessorStatus::from_str(&status_str),
            result,
            timestamp,
        })
    }
}
