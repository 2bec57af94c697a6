use strum::Display;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not available: {message}")]
    NotAvailable { message: String },

    #[error("Bad input: {message}")]
    BadInput { message: String },

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Failed to publish message")]
    Publish(#[from] PublishError),

    #[error("Scan status lookup failed")]
    ScanStatus(#[from] ScanStatusError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization failed")]
    Serialization(#[from] serde_json::Error),
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),

    #[error("Database connection lock poisoned")]
    Lock,
}

/// Errors raised by a message transport when publishing
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Topic {topic} is closed")]
    Closed { topic: String },
}

/// Errors talking to the document storage service about scan status
#[derive(Error, Debug)]
pub enum ScanStatusError {
    #[error("Connection failed to storage service at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Storage service returned status {status} for document {document_id}")]
    Status { document_id: String, status: u16 },

    #[error("Invalid response from storage service")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },
}

/// Errors a processor can raise outside of its classified outcome
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Request to processor endpoint {url} failed")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Processor endpoint returned status {status}: {message}")]
    Endpoint { status: u16, message: String },

    #[error("Invalid response from processor endpoint")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },

    #[error("{message}")]
    Failed { message: String },
}

/// Whether a failed delivery should be attempted again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Retryable,
    Unretryable,
}

/// Outcome of a failed processing execution.
///
/// Queue consumers negatively acknowledge `Retryable` so the message is
/// redelivered, and acknowledge `Unretryable` so it is dropped.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("{message}")]
    Retryable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{message}")]
    Unretryable { message: String },
}

impl ProcessingError {
    pub fn retryable(message: impl Into<String>) -> Self {
        ProcessingError::Retryable {
            message: message.into(),
            source: None,
        }
    }

    pub fn retryable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ProcessingError::Retryable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn unretryable(message: impl Into<String>) -> Self {
        ProcessingError::Unretryable {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProcessingError::Retryable { .. } => FailureKind::Retryable,
            ProcessingError::Unretryable { .. } => FailureKind::Unretryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Retryable
    }
}

/// Raised by event handlers; wraps whatever stopped the event from being handled
#[derive(Error, Debug)]
#[error("Failed to process event {event_id}")]
pub struct EventProcessingError {
    pub event_id: String,
    #[source]
    pub source: ServiceError,
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error and its source chain on a single line for logging.
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
