use std::path::PathBuf;

use paperwatch_core::PaperIdentifier;

/// Outcome of one pass over one note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    /// Raw arXiv links found in the note.
    pub links: usize,
    /// Distinct papers behind those links.
    pub papers: usize,
    /// Papers whose metadata was looked up this pass.
    pub resolved: Vec<PaperIdentifier>,
    /// Papers left pending after a transient failure.
    pub deferred: Vec<PaperIdentifier>,
    /// Papers the metadata service does not know.
    pub failed: Vec<PaperIdentifier>,
    pub downloaded: Vec<PaperIdentifier>,
    /// Papers substituted into the note.
    pub completed: Vec<PaperIdentifier>,
    pub rewritten: bool,
    /// Degraded outcomes that did not stop the pass (PDF, citation count).
    pub warnings: Vec<String>,
}

impl FileReport {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    pub(crate) fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn is_noop(&self) -> bool {
        !self.rewritten && self.resolved.is_empty() && self.downloaded.is_empty()
    }
}

/// Totals over a one-shot run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub files_rewritten: usize,
    pub links: usize,
    pub resolved: usize,
    pub deferred: usize,
    pub failed: usize,
    pub downloaded: usize,
    /// Notes skipped this pass, with the reason.
    pub file_errors: Vec<(PathBuf, String)>,
}

impl RunSummary {
    pub(crate) fn absorb(&mut self, report: &FileReport) {
        self.files_scanned += 1;
        if report.rewritten {
            self.files_rewritten += 1;
        }
        self.links += report.links;
        self.resolved += report.resolved.len();
        self.deferred += report.deferred.len();
        self.failed += report.failed.len();
        self.downloaded += report.downloaded.len();
    }

    pub(crate) fn add_file_error(&mut self, path: PathBuf, error: impl Into<String>) {
        self.file_errors.push((path, error.into()));
    }

    pub fn has_errors(&self) -> bool {
        !self.file_errors.is_empty()
    }
}
