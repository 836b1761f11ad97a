use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PaperwatchError, Result};

/// Per-root config file, looked up inside the watch root.
pub const CONFIG_FILE_NAME: &str = ".paperwatch.toml";

pub const ENV_SEMANTIC_SCHOLAR_API_KEY: &str = "PAPERWATCH_SEMANTIC_SCHOLAR_API_KEY";
pub const ENV_PROXY: &str = "PAPERWATCH_PROXY";

/// How the watcher drives the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Watch the root until cancelled.
    #[default]
    Continuous,
    /// Scan every note once, then exit.
    OneShot,
}

/// Root application configuration.
///
/// Layers, lowest first: built-in defaults, `<root>/.paperwatch.toml`,
/// environment variables, then whatever the CLI sets on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Watch root. Never read from the config file since the file lives inside it.
    #[serde(skip)]
    pub root: PathBuf,
    pub watch: WatchConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// PDF output directory. Relative paths are resolved against the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_dir: Option<PathBuf>,
    pub mode: RunMode,
    /// Note file extension, without the dot.
    pub note_extension: String,
    /// Window in which repeated writes to one file coalesce into one pass.
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_scholar_api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub max_concurrent_lookups: usize,
    pub max_retries: u32,
    pub arxiv_base_url: String,
    pub semantic_scholar_base_url: String,
    pub pdf_base_url: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./papers"),
            watch: WatchConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            pdf_dir: None,
            mode: RunMode::Continuous,
            note_extension: "md".to_string(),
            debounce_ms: 500,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            semantic_scholar_api_key: None,
            request_timeout_secs: 30,
            download_timeout_secs: 60,
            max_concurrent_lookups: 4,
            max_retries: 2,
            arxiv_base_url: "https://export.arxiv.org/api/query".to_string(),
            semantic_scholar_base_url: "https://api.semanticscholar.org/graph/v1".to_string(),
            pdf_base_url: "https://arxiv.org/pdf".to_string(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Config file path for a given watch root.
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE_NAME)
    }

    /// Load the layered config for a watch root: defaults, then the root's
    /// config file if present, then the process environment.
    pub fn for_root(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut config = Self::load_from(&Self::config_path(&root))?;
        config.root = root;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from a specific path, falling back to defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Apply environment overrides through `lookup`, so tests don't touch the real env.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(key) = non_empty(ENV_SEMANTIC_SCHOLAR_API_KEY) {
            self.network.semantic_scholar_api_key = Some(key);
        }
        if let Some(proxy) = non_empty(ENV_PROXY) {
            self.network.proxy = Some(proxy);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.watch.note_extension.trim().is_empty() {
            return Err(PaperwatchError::ConfigError(
                "note_extension must not be empty".to_string(),
            ));
        }
        if self.network.max_concurrent_lookups == 0 {
            return Err(PaperwatchError::ConfigError(
                "max_concurrent_lookups must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    // ─── Derived paths ─────────────────────────────────────

    /// Resolved PDF directory, `<root>/pdfs` unless configured.
    pub fn pdf_dir(&self) -> PathBuf {
        match &self.watch.pdf_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.root.join(dir),
            None => self.root.join("pdfs"),
        }
    }

    /// Path to the persisted state snapshot.
    pub fn state_path(&self) -> PathBuf {
        self.root.join(crate::storage::state::STATE_FILE_NAME)
    }

    /// Note extension without a leading dot, lowercased.
    pub fn note_extension(&self) -> String {
        self.watch
            .note_extension
            .trim()
            .trim_start_matches('.')
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.watch.mode, RunMode::Continuous);
        assert_eq!(cfg.note_extension(), "md");
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut cfg = AppConfig::default();
        cfg.watch.debounce_ms = 900;
        cfg.network.proxy = Some("http://127.0.0.1:7897".to_string());
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.watch.debounce_ms, 900);
        assert_eq!(loaded.network.proxy.as_deref(), Some("http://127.0.0.1:7897"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            AppConfig::config_path(dir.path()),
            "[watch]\nmode = \"one_shot\"\n",
        )
        .unwrap();

        let cfg = AppConfig::for_root(dir.path()).unwrap();
        assert_eq!(cfg.watch.mode, RunMode::OneShot);
        assert_eq!(cfg.watch.note_extension, "md");
        assert_eq!(cfg.root, dir.path());
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(|key| match key {
            ENV_SEMANTIC_SCHOLAR_API_KEY => Some(" secret ".to_string()),
            ENV_PROXY => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.network.semantic_scholar_api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.network.proxy, None);
    }

    #[test]
    fn test_derived_paths() {
        let mut cfg = AppConfig {
            root: PathBuf::from("/notes"),
            ..AppConfig::default()
        };
        assert_eq!(cfg.pdf_dir(), PathBuf::from("/notes/pdfs"));
        assert_eq!(cfg.state_path(), PathBuf::from("/notes/.paperwatch_state.json"));

        cfg.watch.pdf_dir = Some(PathBuf::from("assets"));
        assert_eq!(cfg.pdf_dir(), PathBuf::from("/notes/assets"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut cfg = AppConfig::default();
        cfg.network.max_concurrent_lookups = 0;
        assert!(cfg.validate().is_err());
    }
}
