//! Lookup table from processor id to processor implementation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{DocumentProcessor, KnownProcessor};

/// Registry of processors, populated once at startup and then read-only.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn DocumentProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor under its own id, replacing any previous one
    pub fn register(&mut self, processor: Arc<dyn DocumentProcessor>) {
        let id = processor.processor_id().to_string();

        if KnownProcessor::from_id(&id).is_none() {
            warn!(processor_id = %id, "Registering processor that is not in the catalog");
        }

        if self.processors.insert(id.clone(), processor).is_some() {
            warn!(processor_id = %id, "Replaced previously registered processor");
        } else {
            debug!(processor_id = %id, "Registered processor");
        }
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, processor: Arc<dyn DocumentProcessor>) -> Self {
        self.register(processor);
        self
    }

    /// Find a processor by id. Unknown ids are not an error here.
    pub fn lookup(&self, processor_id: &str) -> Option<Arc<dyn DocumentProcessor>> {
        self.processors.get(processor_id).cloned()
    }

    pub fn contains(&self, processor_id: &str) -> bool {
        self.processors.contains_key(processor_id)
    }

    /// Registered ids, sorted
    pub fn processor_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.processors.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processor_ids", &self.processor_ids())
            .finish()
    }
}
