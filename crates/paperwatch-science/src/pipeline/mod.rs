//! Link-to-citation orchestration: one pass per note, one-shot runs and the
//! continuous watch loop.

mod report;
mod watch;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use paperwatch_core::storage::write_atomic;
use paperwatch_core::{
    AppConfig, NoteFilter, PaperIdentifier, ProcessingRecord, StateStore, scan_notes,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::arxiv::ArxivClient;
use crate::error::{Result, ScienceError};
use crate::fetcher::AssetFetcher;
use crate::http::HttpOptions;
use crate::links::{
    LinkOccurrence, distinct_ids, extract_links, format_citation, relative_link, rewrite_content,
};
use crate::resolver::{MetadataResolver, Resolution};
use crate::sources::SemanticScholarSource;

pub use report::{FileReport, RunSummary};

pub struct Pipeline {
    config: AppConfig,
    store: Arc<Mutex<StateStore>>,
    resolver: MetadataResolver,
    fetcher: AssetFetcher,
    file_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    /// Content of our own last write per note, to ignore the echo event.
    own_writes: Mutex<HashMap<PathBuf, String>>,
}

/// One paper's progress through a pass.
struct Work {
    id: PaperIdentifier,
    record: ProcessingRecord,
    outcome: Option<Resolution>,
    downloaded: bool,
    warnings: Vec<String>,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        store: Arc<Mutex<StateStore>>,
        resolver: MetadataResolver,
        fetcher: AssetFetcher,
    ) -> Self {
        Self {
            config,
            store,
            resolver,
            fetcher,
            file_locks: Mutex::new(HashMap::new()),
            own_writes: Mutex::new(HashMap::new()),
        }
    }

    /// Wire up the arXiv, Semantic Scholar and PDF clients from `config` and
    /// load the root's state file.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let network = &config.network;

        let options = HttpOptions {
            proxy: network.proxy.clone(),
            max_retries: network.max_retries,
            ..HttpOptions::default()
        }
        .with_timeout(Duration::from_secs(network.request_timeout_secs));

        let arxiv = Arc::new(ArxivClient::with_base_url(&network.arxiv_base_url, &options)?);
        let semantic_scholar = Arc::new(SemanticScholarSource::with_base_url(
            &network.semantic_scholar_base_url,
            network.semantic_scholar_api_key.clone(),
            &options,
        )?);
        let resolver = MetadataResolver::new(arxiv, semantic_scholar.clone())
            .with_fallback(semantic_scholar);

        let download_options = options
            .clone()
            .with_timeout(Duration::from_secs(network.download_timeout_secs));
        let fetcher =
            AssetFetcher::with_base_url(&network.pdf_base_url, config.pdf_dir(), &download_options)?;

        let store = StateStore::load(config.state_path());
        info!(records = store.len(), path = %store.path().display(), "state loaded");

        Ok(Self::new(
            config,
            Arc::new(Mutex::new(store)),
            resolver,
            fetcher,
        ))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<Mutex<StateStore>> {
        self.store.clone()
    }

    /// Notes under the root, minus hidden paths and the PDF directory.
    pub fn note_filter(&self) -> NoteFilter {
        NoteFilter::new(&self.config.root, &self.config.note_extension())
            .exclude(self.config.pdf_dir())
    }

    /// Process every note under the root once.
    ///
    /// Only an unreadable root is an error. A note that cannot be read or
    /// written is recorded in the summary and the run moves on.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let scan = scan_notes(&self.note_filter())?;
        let mut summary = RunSummary::default();
        for (path, err) in scan.errors {
            summary.add_file_error(path, err);
        }

        info!(files = scan.files.len(), "scanning notes");
        for path in scan.files {
            match self.process_file(&path).await {
                Ok(report) => summary.absorb(&report),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "skipping note");
                    summary.add_file_error(path, e.to_string());
                }
            }
        }

        info!(
            files = summary.files_scanned,
            rewritten = summary.files_rewritten,
            deferred = summary.deferred,
            errors = summary.file_errors.len(),
            "run complete"
        );
        Ok(summary)
    }

    /// One pass over one note: extract links, advance every paper that
    /// still needs work, rewrite the note once and persist the store.
    ///
    /// The whole pass holds the note's lock, so read, substitute and write
    /// never race another pass over the same file.
    pub async fn process_file(&self, path: &Path) -> Result<FileReport> {
        let lock = self.file_lock(path).await;
        let _guard = lock.lock().await;

        let mut report = FileReport::new(path.to_path_buf());
        let content = tokio::fs::read_to_string(path).await?;
        let occurrences = extract_links(&content);
        if occurrences.is_empty() {
            debug!(path = %path.display(), "no arXiv links");
            return Ok(report);
        }

        let ids = distinct_ids(&occurrences);
        report.links = occurrences.len();
        report.papers = ids.len();
        info!(path = %path.display(), links = report.links, papers = report.papers, "processing note");

        let works = self.snapshot(&ids, &occurrences).await;
        let works = self.advance(works).await;

        let note_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut replacements = HashMap::new();
        for work in &works {
            match &work.outcome {
                Some(Resolution::Ready { fetched: true, .. }) => report.resolved.push(work.id.clone()),
                Some(Resolution::Deferred(_)) => report.deferred.push(work.id.clone()),
                Some(Resolution::Failed(_)) => report.failed.push(work.id.clone()),
                _ => {}
            }
            if work.downloaded {
                report.downloaded.push(work.id.clone());
            }
            for warning in &work.warnings {
                report.add_warning(warning.clone());
            }

            if let Some(citation) = citation_for(work, note_dir, &occurrences) {
                replacements.insert(work.id.clone(), citation);
            }
        }

        // Re-read right before writing so edits made during the lookups survive.
        let mut completed: Vec<PaperIdentifier> = Vec::new();
        if !replacements.is_empty() {
            let fresh = match tokio::fs::read_to_string(path).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    self.commit(works, &[]).await?;
                    return Err(e.into());
                }
            };
            if let Some(updated) = rewrite_content(&fresh, &replacements) {
                completed = distinct_ids(&extract_links(&fresh))
                    .into_iter()
                    .filter(|id| replacements.contains_key(id))
                    .collect();
                if let Err(e) = write_atomic(path, updated.as_bytes()) {
                    // Lookups still count; nothing is marked completed.
                    self.commit(works, &[]).await?;
                    return Err(e.into());
                }
                self.own_writes
                    .lock()
                    .await
                    .insert(path.to_path_buf(), updated);
                report.rewritten = true;
                info!(path = %path.display(), citations = completed.len(), "note rewritten");
            }
        }

        self.commit(works, &completed).await?;
        report.completed = completed;
        Ok(report)
    }

    /// Current records for `ids`, created as needed.
    async fn snapshot(&self, ids: &[PaperIdentifier], occurrences: &[LinkOccurrence]) -> Vec<Work> {
        let store = self.store.lock().await;
        ids.iter()
            .map(|id| {
                let mut record = store.get(id).cloned().unwrap_or_default();
                if let Some(first) = occurrences.iter().find(|o| &o.id == id) {
                    record.remember_source(&first.url());
                }
                Work {
                    id: id.clone(),
                    record,
                    outcome: None,
                    downloaded: false,
                    warnings: Vec::new(),
                }
            })
            .collect()
    }

    /// Run lookups and downloads for every paper that needs them,
    /// concurrently up to `max_concurrent_lookups`.
    async fn advance(&self, works: Vec<Work>) -> Vec<Work> {
        let limit = self.config.network.max_concurrent_lookups.max(1);
        stream::iter(works)
            .map(|work| self.advance_one(work))
            .buffer_unordered(limit)
            .collect()
            .await
    }

    async fn advance_one(&self, mut work: Work) -> Work {
        let record = &mut work.record;
        if record.needs_metadata() || record.needs_citations() {
            let outcome = self.resolver.resolve(&work.id, record).await;
            if outcome.is_ready() && record.citation_count.is_none() {
                work.warnings
                    .push(format!("{}: citation count unavailable", work.id));
            }
            work.outcome = Some(outcome);
        }

        // A PDF deleted from disk since the last pass is fetched again.
        let pdf_missing = record.pdf_path.as_ref().is_none_or(|p| !p.is_file());
        if pdf_missing {
            if let Some(metadata) = record.metadata.clone() {
                let existed = self.fetcher.target_path(&metadata).is_file();
                match self.fetcher.fetch(&work.id, &metadata).await {
                    Ok(pdf) => {
                        record.set_pdf_path(pdf);
                        work.downloaded = !existed;
                    }
                    Err(e) => {
                        warn!(id = %work.id, error = %e, "pdf download failed");
                        work.warnings.push(format!("{}: pdf download failed: {e}", work.id));
                    }
                }
            }
        }
        work
    }

    /// Write the pass's records back and persist, marking `completed` ids.
    async fn commit(&self, works: Vec<Work>, completed: &[PaperIdentifier]) -> Result<()> {
        let mut store = self.store.lock().await;
        for work in works {
            // Another note's pass may have advanced this paper meanwhile.
            let mut record = match store.get(&work.id) {
                Some(stored) => {
                    let mut merged = stored.clone();
                    merged.merge(work.record);
                    merged
                }
                None => work.record,
            };
            if completed.contains(&work.id) {
                record.mark_completed();
            }
            store.upsert(work.id, record);
        }
        store.save().map_err(ScienceError::from)
    }

    async fn file_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.file_locks.lock().await;
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// True when the note's content is exactly what we last wrote to it.
    pub(crate) async fn is_own_write(&self, path: &Path) -> bool {
        let own = self.own_writes.lock().await;
        let Some(written) = own.get(path) else {
            return false;
        };
        match tokio::fs::read_to_string(path).await {
            Ok(current) => &current == written,
            Err(_) => false,
        }
    }

    pub(crate) async fn forget(&self, path: &Path) {
        self.own_writes.lock().await.remove(path);
        self.file_locks.lock().await.remove(path);
    }
}

/// The citation text for `work`, if enough is known to write one.
fn citation_for(work: &Work, note_dir: &Path, occurrences: &[LinkOccurrence]) -> Option<String> {
    let record = &work.record;
    let metadata = record.metadata.as_ref()?;

    let pdf_link = record
        .pdf_path
        .as_deref()
        .filter(|p| p.is_file())
        .map(|p| relative_link(note_dir, p));

    let source_url = occurrences
        .iter()
        .find(|o| o.id == work.id)
        .map(LinkOccurrence::url)
        .or_else(|| record.source_url.clone())
        .unwrap_or_else(|| work.id.abs_url());

    Some(format_citation(
        metadata,
        record.citation_count,
        pdf_link.as_deref(),
        &source_url,
    ))
}
