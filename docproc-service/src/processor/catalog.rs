//! Catalog of the processors this deployment knows how to describe.

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Processors offered by the document AI backend.
///
/// Ids outside this list can still be registered; the catalog only supplies
/// display metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum KnownProcessor {
    #[strum(serialize = "docai-id-proofing")]
    IdProofing,
    #[strum(serialize = "docai-document-quality")]
    DocumentQuality,
}

impl KnownProcessor {
    pub fn id(&self) -> String {
        self.to_string()
    }

    pub fn name(&self) -> &'static str {
        match self {
            KnownProcessor::IdProofing => "ID Proofing",
            KnownProcessor::DocumentQuality => "Document Quality",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            KnownProcessor::IdProofing => "ID Proofing Processor",
            KnownProcessor::DocumentQuality => "Document Quality Processor",
        }
    }

    /// Look up catalog metadata for a processor id
    pub fn from_id(id: &str) -> Option<Self> {
        id.parse().ok()
    }

    pub fn all() -> impl Iterator<Item = KnownProcessor> {
        KnownProcessor::iter()
    }
}
