//! Bibliographic and citation lookups applied to a processing record.

use std::sync::Arc;

use chrono::Utc;
use paperwatch_core::{PaperIdentifier, ProcessingRecord};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::sources::{BibliographicLookup, CitationLookup, LookupResult};

/// What a resolve pass did to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Metadata is present. `fetched` is false when it was already known and
    /// only the citation count (if anything) was looked up.
    Ready { fetched: bool, citations: Option<u64> },
    /// Lookup failed transiently; the record stays pending for the next pass.
    Deferred(String),
    /// The paper does not exist; the record is now failed.
    Failed(String),
}

impl Resolution {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

pub struct MetadataResolver {
    primary: Arc<dyn BibliographicLookup>,
    fallback: Option<Arc<dyn BibliographicLookup>>,
    citations: Arc<dyn CitationLookup>,
}

impl MetadataResolver {
    pub fn new(
        primary: Arc<dyn BibliographicLookup>,
        citations: Arc<dyn CitationLookup>,
    ) -> Self {
        Self {
            primary,
            fallback: None,
            citations,
        }
    }

    /// Consulted when the primary lookup fails for any reason.
    pub fn with_fallback(mut self, fallback: Arc<dyn BibliographicLookup>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Bring `record` as far as lookups can: metadata when missing, then the
    /// citation count when unknown. A record that already has both is left
    /// untouched.
    pub async fn resolve(&self, id: &PaperIdentifier, record: &mut ProcessingRecord) -> Resolution {
        record.reopen();

        let fetched = record.needs_metadata();
        if fetched {
            let now = Utc::now();
            match self.lookup_metadata(id).await {
                Ok(found) => {
                    info!(%id, title = %found.metadata.title, "metadata resolved");
                    record.set_metadata(found.metadata, now);
                    if found.citation_count.is_some() {
                        record.set_citation_count(found.citation_count, now);
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(%id, error = %e, retry = record.retry_count + 1, "metadata unavailable");
                    record.record_attempt_failure(now);
                    return Resolution::Deferred(e.to_string());
                }
                Err(e) => {
                    warn!(%id, error = %e, "paper not found, marking failed");
                    record.mark_failed(e.to_string(), now);
                    return Resolution::Failed(e.to_string());
                }
            }
        }

        if record.needs_citations() {
            let count = match self.citations.citation_count(id).await {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!(%id, source = self.citations.name(), error = %e, "citation count unknown");
                    None
                }
            };
            record.set_citation_count(count, Utc::now());
        } else {
            debug!(%id, "citation count already known");
        }

        Resolution::Ready {
            fetched,
            citations: record.citation_count,
        }
    }

    async fn lookup_metadata(&self, id: &PaperIdentifier) -> Result<LookupResult> {
        let primary_err = match self.primary.lookup(id).await {
            Ok(found) => return Ok(found),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_err);
        };

        debug!(
            %id,
            primary = self.primary.name(),
            fallback = fallback.name(),
            error = %primary_err,
            "trying fallback metadata source"
        );
        match fallback.lookup(id).await {
            Ok(found) => Ok(found),
            // The primary's verdict decides between "retry" and "no such paper".
            Err(e) => {
                debug!(%id, error = %e, "fallback lookup failed");
                Err(primary_err)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use paperwatch_core::{PaperIdentifier, PaperMetadata};

    use crate::error::{Result, ScienceError};
    use crate::sources::{BibliographicLookup, CitationLookup, LookupResult};

    /// In-memory lookup; ids without an entry answer with `missing`.
    pub struct FakeSource {
        pub papers: Mutex<HashMap<String, PaperMetadata>>,
        pub counts: Mutex<HashMap<String, u64>>,
        /// Counts returned together with the metadata.
        pub bundled_counts: Mutex<HashMap<String, u64>>,
        pub missing: fn(&str) -> ScienceError,
        pub calls: AtomicUsize,
        pub citation_calls: AtomicUsize,
    }

    impl FakeSource {
        pub fn new(missing: fn(&str) -> ScienceError) -> Self {
            Self {
                papers: Mutex::new(HashMap::new()),
                counts: Mutex::new(HashMap::new()),
                bundled_counts: Mutex::new(HashMap::new()),
                missing,
                calls: AtomicUsize::new(0),
                citation_calls: AtomicUsize::new(0),
            }
        }

        pub fn with_paper(self, id: &str, metadata: PaperMetadata) -> Self {
            self.papers.lock().unwrap().insert(id.to_string(), metadata);
            self
        }

        pub fn with_count(self, id: &str, count: u64) -> Self {
            self.counts.lock().unwrap().insert(id.to_string(), count);
            self
        }

        pub fn with_bundled_count(self, id: &str, count: u64) -> Self {
            self.bundled_counts
                .lock()
                .unwrap()
                .insert(id.to_string(), count);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn citation_calls(&self) -> usize {
            self.citation_calls.load(Ordering::SeqCst)
        }
    }

    pub fn timeout(id: &str) -> ScienceError {
        ScienceError::Timeout(id.to_string())
    }

    pub fn not_found(id: &str) -> ScienceError {
        ScienceError::NotFound(id.to_string())
    }

    #[async_trait]
    impl BibliographicLookup for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn lookup(&self, id: &PaperIdentifier) -> Result<LookupResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let metadata = self
                .papers
                .lock()
                .unwrap()
                .get(id.as_str())
                .cloned()
                .ok_or_else(|| (self.missing)(id.as_str()))?;
            Ok(LookupResult {
                metadata,
                citation_count: self.bundled_counts.lock().unwrap().get(id.as_str()).copied(),
            })
        }
    }

    #[async_trait]
    impl CitationLookup for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn citation_count(&self, id: &PaperIdentifier) -> Result<u64> {
            self.citation_calls.fetch_add(1, Ordering::SeqCst);
            self.counts
                .lock()
                .unwrap()
                .get(id.as_str())
                .copied()
                .ok_or_else(|| timeout(id.as_str()))
        }
    }

    pub fn resnet() -> PaperMetadata {
        PaperMetadata {
            title: "Deep Residual Learning for Image Recognition".to_string(),
            authors: vec![
                "Kaiming He".to_string(),
                "Xiangyu Zhang".to_string(),
                "Shaoqing Ren".to_string(),
                "Jian Sun".to_string(),
            ],
            venue: Some("arXiv:cs.CV".to_string()),
            year: Some(2015),
        }
    }
}
