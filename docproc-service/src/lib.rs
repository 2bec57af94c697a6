//! Document processing orchestration.
//!
//! Fans documents out to pluggable processors over a work queue, records every
//! outcome as a result row and classifies failures for redelivery.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod ingress;
pub mod processor;
pub mod queue;
pub mod scan;
pub mod service;
pub mod store;
#[cfg(test)]
mod testing;

/// Topic carrying one processing request per (document, processor)
pub const REQUEST_TOPIC: &str = "document-processing";
/// Topic carrying `COMPLETE` results
pub const RESULT_TOPIC: &str = "document-processing-result";
/// Topic carrying initiate-processing events
pub const EVENT_TOPIC: &str = "initiate-document-processing";
