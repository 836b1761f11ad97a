//! One-shot enumeration of note files under the watch root.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{PaperwatchError, Result};

/// Decides which paths under the root are notes.
#[derive(Debug, Clone)]
pub struct NoteFilter {
    root: PathBuf,
    extension: String,
    excluded: Vec<PathBuf>,
}

impl NoteFilter {
    pub fn new(root: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_lowercase(),
            excluded: Vec::new(),
        }
    }

    /// Never report anything under `dir` (the PDF directory, typically).
    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True for a path with the note extension that is not hidden or excluded.
    /// Only components below the root are checked for dot-prefixes.
    pub fn matches(&self, path: &Path) -> bool {
        if self.excluded.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            return false;
        }
        self.has_extension(path)
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase() == self.extension)
            .unwrap_or(false)
    }

    fn skips_dir(&self, dir: &Path) -> bool {
        if self.excluded.iter().any(|excluded| dir.starts_with(excluded)) {
            return true;
        }
        dir.file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(false)
    }
}

/// Result of scanning the watch root.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Note files found, sorted.
    pub files: Vec<PathBuf>,
    /// Entries that could not be read; they are skipped for this pass.
    pub errors: Vec<(PathBuf, String)>,
}

/// Walk the root recursively and collect every note file.
///
/// Only an unreadable root is an error; anything below it that fails is
/// logged, recorded in `errors` and skipped.
pub fn scan_notes(filter: &NoteFilter) -> Result<ScanResult> {
    let root = filter.root();
    let entries = fs::read_dir(root).map_err(|source| PaperwatchError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut result = ScanResult::default();
    walk(filter, entries, &mut result);
    result.files.sort();
    Ok(result)
}

fn walk(filter: &NoteFilter, entries: fs::ReadDir, result: &mut ScanResult) {
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                result.errors.push((filter.root().to_path_buf(), e.to_string()));
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping entry");
                result.errors.push((path, e.to_string()));
                continue;
            }
        };

        if file_type.is_dir() {
            if filter.skips_dir(&path) {
                continue;
            }
            match fs::read_dir(&path) {
                Ok(sub) => walk(filter, sub, result),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable directory");
                    result.errors.push((path, e.to_string()));
                }
            }
        } else if filter.matches(&path) {
            result.files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_scan_finds_notes_recursively() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("a.md"));
        touch(&root.join("topic/b.MD"));
        touch(&root.join("topic/deep/c.md"));
        touch(&root.join("readme.txt"));

        let result = scan_notes(&NoteFilter::new(root, "md")).unwrap();
        assert_eq!(
            result.files,
            vec![
                root.join("a.md"),
                root.join("topic/b.MD"),
                root.join("topic/deep/c.md"),
            ]
        );
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_scan_skips_hidden_and_excluded() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join(".obsidian/cache.md"));
        touch(&root.join(".draft.md"));
        touch(&root.join("pdfs/notes.md"));
        touch(&root.join("keep.md"));

        let filter = NoteFilter::new(root, ".md").exclude(root.join("pdfs"));
        let result = scan_notes(&filter).unwrap();
        assert_eq!(result.files, vec![root.join("keep.md")]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let filter = NoteFilter::new(dir.path().join("missing"), "md");
        assert!(matches!(
            scan_notes(&filter),
            Err(PaperwatchError::RootUnreadable { .. })
        ));
    }

    #[test]
    fn test_filter_ignores_hidden_ancestors_above_root() {
        let filter = NoteFilter::new("/home/u/.notes", "md");
        assert!(filter.matches(Path::new("/home/u/.notes/paper.md")));
        assert!(!filter.matches(Path::new("/home/u/.notes/.trash/paper.md")));
        assert!(!filter.matches(Path::new("/home/u/.notes/paper.txt")));
    }
}
