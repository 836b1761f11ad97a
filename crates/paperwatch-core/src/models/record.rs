use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an identifier is in the link-to-citation pipeline.
///
/// Statuses only move forward. `Failed` is the one exception: it re-enters
/// `Pending` when the identifier is retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Pending,
    MetadataReady,
    AssetReady,
    Completed,
    Failed(String),
}

impl RecordStatus {
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::MetadataReady => Some(1),
            Self::AssetReady => Some(2),
            Self::Completed => Some(3),
            Self::Failed(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::MetadataReady => "metadata_ready",
            Self::AssetReady => "asset_ready",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Bibliographic fields needed to format a citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PaperMetadata {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// Persisted processing state for one canonical identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub status: RecordStatus,
    #[serde(default)]
    pub metadata: Option<PaperMetadata>,
    /// `None` is "unknown": a valid outcome, distinct from a failed record.
    #[serde(default)]
    pub citation_count: Option<u64>,
    #[serde(default)]
    pub citations_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pdf_path: Option<PathBuf>,
    /// First raw link this identifier was seen as.
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_attempt_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingRecord {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            status: RecordStatus::Pending,
            metadata: None,
            citation_count: None,
            citations_checked_at: None,
            pdf_path: None,
            source_url: None,
            retry_count: 0,
            last_attempt_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Move forward to `target`; a lower or equal status is a no-op.
    pub fn advance_to(&mut self, target: RecordStatus) {
        let advance = match (self.status.rank(), target.rank()) {
            (Some(current), Some(next)) => next > current,
            // Only `reopen` leaves the failed state.
            (None, _) => false,
            (Some(_), None) => true,
        };
        if advance {
            self.status = target;
            self.touch();
        }
    }

    /// Put a failed record back into the pipeline. Other statuses are untouched.
    pub fn reopen(&mut self) {
        if self.status.is_failed() {
            self.status = RecordStatus::Pending;
            self.touch();
        }
    }

    pub fn remember_source(&mut self, url: &str) {
        if self.source_url.is_none() {
            self.source_url = Some(url.to_string());
        }
    }

    /// A transient miss: stay where we are, count the attempt.
    pub fn record_attempt_failure(&mut self, at: DateTime<Utc>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_attempt_time = Some(at);
        self.touch();
    }

    /// A definitive miss, e.g. the metadata service knows no such paper.
    pub fn mark_failed(&mut self, reason: impl Into<String>, at: DateTime<Utc>) {
        self.record_attempt_failure(at);
        if self.metadata.is_none() {
            self.status = RecordStatus::Failed(reason.into());
        }
    }

    pub fn set_metadata(&mut self, metadata: PaperMetadata, at: DateTime<Utc>) {
        self.metadata = Some(metadata);
        self.last_attempt_time = Some(at);
        self.advance_to(RecordStatus::MetadataReady);
    }

    pub fn set_citation_count(&mut self, count: Option<u64>, at: DateTime<Utc>) {
        if count.is_some() {
            self.citation_count = count;
        }
        self.citations_checked_at = Some(at);
        self.touch();
    }

    pub fn set_pdf_path(&mut self, path: PathBuf) {
        self.pdf_path = Some(path);
        self.advance_to(RecordStatus::AssetReady);
    }

    /// Only call once the formatted citation is on disk.
    pub fn mark_completed(&mut self) {
        if self.metadata.is_some() {
            self.advance_to(RecordStatus::Completed);
        }
    }

    /// Fold `newer`, another pass's copy of this record, into `self`.
    ///
    /// The result keeps the further-advanced status and every field either
    /// side knows, so an overlapping pass that started from an older copy
    /// cannot undo progress already stored.
    pub fn merge(&mut self, newer: ProcessingRecord) {
        let keep_status = match (self.status.rank(), newer.status.rank()) {
            (Some(stored), Some(next)) => stored >= next,
            // A failed copy never overrides a record that has metadata.
            (Some(stored), None) => stored > 0,
            (None, _) => false,
        };
        if !keep_status {
            self.status = newer.status;
        }

        self.metadata = newer.metadata.or(self.metadata.take());
        self.citation_count = newer.citation_count.or(self.citation_count);
        self.citations_checked_at = self.citations_checked_at.max(newer.citations_checked_at);
        self.pdf_path = newer.pdf_path.or(self.pdf_path.take());
        self.source_url = self.source_url.take().or(newer.source_url);
        self.retry_count = self.retry_count.max(newer.retry_count);
        self.last_attempt_time = self.last_attempt_time.max(newer.last_attempt_time);
        self.created_at = self.created_at.min(newer.created_at);
        self.updated_at = self.updated_at.max(newer.updated_at);
    }

    pub fn needs_metadata(&self) -> bool {
        self.metadata.is_none()
    }

    pub fn needs_citations(&self) -> bool {
        self.metadata.is_some() && self.citation_count.is_none()
    }

    pub fn needs_asset(&self) -> bool {
        self.metadata.is_some() && self.pdf_path.is_none()
    }
}

impl Default for ProcessingRecord {
    fn default() -> Self {
        Self::new()
    }
}
