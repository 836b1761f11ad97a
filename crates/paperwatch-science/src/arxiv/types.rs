use chrono::{DateTime, Datelike, Utc};
use paperwatch_core::PaperMetadata;

use crate::identifiers::arxiv::ArxivId;

/// The parts of an arXiv Atom entry that end up in a citation.
#[derive(Debug, Clone)]
pub struct ArxivMetadata {
    pub arxiv_id: ArxivId,
    pub title: String,
    pub authors: Vec<String>,
    pub published: DateTime<Utc>,
    pub primary_category: String,
}

impl ArxivMetadata {
    /// Venue label used in citations: `arXiv:<primary category>`.
    pub fn venue(&self) -> String {
        if self.primary_category.is_empty() {
            "arXiv".to_string()
        } else {
            format!("arXiv:{}", self.primary_category)
        }
    }
}

impl From<ArxivMetadata> for PaperMetadata {
    fn from(value: ArxivMetadata) -> Self {
        PaperMetadata {
            venue: Some(value.venue()),
            year: Some(value.published.year()),
            title: value.title,
            authors: value.authors,
        }
    }
}
