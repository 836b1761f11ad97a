use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical key for a paper: the arXiv id with scheme, host, version and
/// `.pdf` suffix stripped (`1512.03385`, `hep-th/9901001`).
///
/// Construct it through the identifier parser in `paperwatch-science`; this
/// type only guarantees the string is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperIdentifier(String);

impl PaperIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical abstract page for this paper.
    pub fn abs_url(&self) -> String {
        format!("https://arxiv.org/abs/{}", self.0)
    }
}

impl fmt::Display for PaperIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for PaperIdentifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for PaperIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
