use async_trait::async_trait;
use paperwatch_core::{PaperIdentifier, PaperMetadata};

use crate::error::Result;

/// A bibliographic answer. Sources whose record already carries the
/// citation count return it so no second request is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub metadata: PaperMetadata,
    pub citation_count: Option<u64>,
}

impl From<PaperMetadata> for LookupResult {
    fn from(metadata: PaperMetadata) -> Self {
        Self {
            metadata,
            citation_count: None,
        }
    }
}

/// Resolves title, authors, venue and year for a paper.
#[async_trait]
pub trait BibliographicLookup: Send + Sync {
    fn name(&self) -> &str;

    /// `ScienceError::NotFound` means the service definitively has no such
    /// paper; every other error is worth retrying later.
    async fn lookup(&self, id: &PaperIdentifier) -> Result<LookupResult>;
}

/// Resolves how often a paper has been cited.
#[async_trait]
pub trait CitationLookup: Send + Sync {
    fn name(&self) -> &str;

    async fn citation_count(&self, id: &PaperIdentifier) -> Result<u64>;
}

pub mod semantic_scholar;

pub use semantic_scholar::SemanticScholarSource;
