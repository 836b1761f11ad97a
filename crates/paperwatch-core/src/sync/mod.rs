pub mod debounce;
pub mod scan;
pub mod watcher;

pub use debounce::Debouncer;
pub use scan::{NoteFilter, ScanResult, scan_notes};
pub use watcher::{NoteWatcher, WatchEvent};
