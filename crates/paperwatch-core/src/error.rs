use std::path::PathBuf;

use thiserror::Error;

/// All errors that can occur in paperwatch-core.
#[derive(Debug, Error)]
pub enum PaperwatchError {
    #[error("Watch root is not readable: {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify_debouncer_mini::notify::Error),

    #[error("Atomic write failed: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type Result<T> = std::result::Result<T, PaperwatchError>;
