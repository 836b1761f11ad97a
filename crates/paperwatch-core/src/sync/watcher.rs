use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::sync::scan::NoteFilter;

/// Raw notify bursts are merged over this interval before filtering; the
/// per-file quiet window is applied afterwards by [`crate::sync::Debouncer`].
const RAW_BATCH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchEvent {
    /// A note was created or written.
    NoteChanged { path: PathBuf },
    /// A note disappeared.
    NoteRemoved { path: PathBuf },
}

pub struct NoteWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl NoteWatcher {
    /// Start watching the filter's root. Connects the notify debouncer to a
    /// standard thread that filters raw events down to note files and emits
    /// `WatchEvent`s through the returned channel.
    ///
    /// Watching stops when the returned `NoteWatcher` is dropped.
    pub fn start(filter: NoteFilter) -> Result<(Self, mpsc::Receiver<WatchEvent>)> {
        let (raw_tx, raw_rx) = mpsc::channel::<DebounceEventResult>();
        let (event_tx, event_rx) = mpsc::channel::<WatchEvent>();

        let mut debouncer = new_debouncer(RAW_BATCH_INTERVAL, move |res: DebounceEventResult| {
            let _ = raw_tx.send(res);
        })?;

        debouncer
            .watcher()
            .watch(filter.root(), RecursiveMode::Recursive)?;

        std::thread::spawn(move || {
            Self::process_events(raw_rx, event_tx, filter);
        });

        Ok((
            Self {
                _debouncer: debouncer,
            },
            event_rx,
        ))
    }

    fn process_events(
        raw_rx: mpsc::Receiver<DebounceEventResult>,
        event_tx: mpsc::Sender<WatchEvent>,
        filter: NoteFilter,
    ) {
        while let Ok(res) = raw_rx.recv() {
            let events = match res {
                Ok(events) => events,
                Err(e) => {
                    warn!(error = ?e, "watcher error");
                    continue;
                }
            };

            for event in events {
                if let Some(out) = classify(&filter, event.path) {
                    if event_tx.send(out).is_err() {
                        debug!("watch event receiver dropped, stopping");
                        return;
                    }
                }
            }
        }
    }
}

fn classify(filter: &NoteFilter, path: PathBuf) -> Option<WatchEvent> {
    if !filter.matches(&path) {
        return None;
    }
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => Some(WatchEvent::NoteChanged { path }),
        Ok(_) => None,
        Err(_) => Some(WatchEvent::NoteRemoved { path }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn classify_existing_note_as_changed() {
        let dir = TempDir::new().unwrap();
        let note = dir.path().join("paper.md");
        std::fs::write(&note, "x").unwrap();

        let filter = NoteFilter::new(dir.path(), "md");
        assert_eq!(
            classify(&filter, note.clone()),
            Some(WatchEvent::NoteChanged { path: note })
        );
    }

    #[test]
    fn classify_missing_note_as_removed() {
        let dir = TempDir::new().unwrap();
        let note = dir.path().join("gone.md");
        let filter = NoteFilter::new(dir.path(), "md");
        assert_eq!(
            classify(&filter, note.clone()),
            Some(WatchEvent::NoteRemoved { path: note })
        );
    }

    #[test]
    fn classify_ignores_temp_and_foreign_files() {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join(".paperwatch-abc.tmp");
        let pdf = dir.path().join("pdfs").join("He_2015.pdf");
        std::fs::write(&tmp, "x").unwrap();

        let filter = NoteFilter::new(dir.path(), "md").exclude(dir.path().join("pdfs"));
        assert_eq!(classify(&filter, tmp), None);
        assert_eq!(classify(&filter, pdf), None);
    }

    #[test]
    fn watcher_reports_written_note() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (_watcher, rx) = NoteWatcher::start(NoteFilter::new(&root, "md")).unwrap();

        let note = root.join("fresh.md");
        std::fs::write(&note, "https://arxiv.org/abs/1512.03385").unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event, WatchEvent::NoteChanged { path: note });
    }
}
