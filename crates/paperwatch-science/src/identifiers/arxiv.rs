use once_cell::sync::Lazy;
use paperwatch_core::PaperIdentifier;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScienceError};

// New format: YYMM.NNNN or YYMM.NNNNN (with optional version)
static NEW_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}\.\d{4,5})(v(\d+))?$").expect("valid regex"));

// Old format: archive[.SUBJECT]/YYMMNNN
static OLD_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z\-]+)(\.[a-zA-Z]{2})?/(\d{7})(v(\d+))?$").expect("valid regex")
});

// Hosts that serve arXiv abstract and PDF pages, including the legacy LANL mirror.
static URL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.|export\.)?(?:arxiv\.org|xxx\.lanl\.gov)/(?:abs|pdf)/")
        .expect("valid regex")
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArxivId {
    pub raw: String,
    /// Id without version: `1512.03385`, `hep-th/9901001`.
    pub id: String,
    pub version: Option<u16>,
    pub category: Option<String>,
}

impl ArxivId {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let stripped = if let Some(m) = URL_PREFIX.find(input) {
            let rest = &input[m.end()..];
            rest.strip_suffix(".pdf")
                .or_else(|| rest.strip_suffix(".PDF"))
                .unwrap_or(rest)
                .trim_end_matches('/')
        } else if let Some(s) = input
            .get(..6)
            .filter(|prefix| prefix.eq_ignore_ascii_case("arxiv:"))
            .map(|_| &input[6..])
        {
            s
        } else {
            input
        };

        if let Some(caps) = NEW_FORMAT.captures(stripped) {
            return Ok(Self {
                raw: input.to_string(),
                id: caps[1].to_string(),
                version: caps.get(3).and_then(|v| v.as_str().parse().ok()),
                category: None,
            });
        }

        if let Some(caps) = OLD_FORMAT.captures(stripped) {
            let archive = caps[1].to_lowercase();
            let subject = caps
                .get(2)
                .map(|s| s.as_str().to_uppercase())
                .unwrap_or_default();
            let category = format!("{archive}{subject}");
            return Ok(Self {
                raw: input.to_string(),
                id: format!("{category}/{}", &caps[3]),
                version: caps.get(5).and_then(|v| v.as_str().parse().ok()),
                category: Some(category),
            });
        }

        Err(ScienceError::InvalidArxivId(input.to_string()))
    }

    /// Version-free key shared by every spelling of this paper.
    pub fn canonical(&self) -> PaperIdentifier {
        PaperIdentifier::new(self.id.as_str())
    }
}

impl From<&ArxivId> for PaperIdentifier {
    fn from(value: &ArxivId) -> Self {
        value.canonical()
    }
}
