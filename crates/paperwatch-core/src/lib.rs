//! paperwatch core: data model, state store, configuration and note watching.

pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod sync;

pub use config::{AppConfig, RunMode};
pub use error::{PaperwatchError, Result};
pub use models::*;

pub use storage::state::{StateStore, StateSummary, STATE_FILE_NAME};
pub use sync::{Debouncer, NoteFilter, NoteWatcher, ScanResult, WatchEvent, scan_notes};
