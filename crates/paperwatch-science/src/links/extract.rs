use std::ops::Range;

use once_cell::sync::Lazy;
use paperwatch_core::PaperIdentifier;
use regex::Regex;
use tracing::debug;

use crate::identifiers::arxiv::ArxivId;

// Abstract pages, direct PDFs and the legacy LANL mirror, scheme optional.
static LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:https?://)?(?:www\.|export\.)?(?:arxiv\.org|xxx\.lanl\.gov)/(?:abs|pdf)/[^\s()\[\]<>"'`]+"#,
    )
    .expect("valid regex")
});

/// Sentence punctuation that commonly trails a pasted link.
const TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', '*', '_'];

/// One raw arXiv link in a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOccurrence {
    /// Byte offsets of the raw link in the text it was extracted from.
    pub span: Range<usize>,
    pub raw: String,
    pub id: PaperIdentifier,
}

impl LinkOccurrence {
    /// The link as a clickable URL; bare `arxiv.org/...` gets `https://`.
    pub fn url(&self) -> String {
        if self.raw.to_ascii_lowercase().starts_with("http") {
            self.raw.clone()
        } else {
            format!("https://{}", self.raw)
        }
    }
}

/// Every raw arXiv link in `text`, in source order.
///
/// Links that are part of a Markdown link (`[label](url)`), as its target or
/// as its whole label, are skipped: that is how formatted citations carry
/// their source URL, so rewritten text never yields the same paper again, and
/// a citation is never spliced into another link's label. Matches that do not
/// parse as an arXiv id are dropped.
pub fn extract_links(text: &str) -> Vec<LinkOccurrence> {
    let mut out = Vec::new();
    for m in LINK_REGEX.find_iter(text) {
        if in_markdown_link(text, m.start(), m.end()) {
            continue;
        }

        let raw = m.as_str().trim_end_matches(TRAILING);
        let span = m.start()..m.start() + raw.len();
        let without_query = raw.split(['?', '#']).next().unwrap_or(raw);

        match ArxivId::parse(without_query) {
            Ok(parsed) => out.push(LinkOccurrence {
                span,
                raw: raw.to_string(),
                id: parsed.canonical(),
            }),
            Err(_) => debug!(raw, "dropping malformed arXiv link"),
        }
    }
    out
}

fn in_markdown_link(text: &str, start: usize, end: usize) -> bool {
    let before = &text[..start];
    before.ends_with("](") || (before.ends_with('[') && text[end..].starts_with("]("))
}

/// Distinct identifiers in first-seen order.
pub fn distinct_ids(occurrences: &[LinkOccurrence]) -> Vec<PaperIdentifier> {
    let mut ids: Vec<PaperIdentifier> = Vec::new();
    for occurrence in occurrences {
        if !ids.contains(&occurrence.id) {
            ids.push(occurrence.id.clone());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(text: &str) -> Vec<String> {
        extract_links(text)
            .into_iter()
            .map(|o| o.id.to_string())
            .collect()
    }

    #[test]
    fn test_all_shapes_share_one_identifier() {
        let text = "\
abs: https://arxiv.org/abs/1512.03385
pdf: https://arxiv.org/pdf/1512.03385v2.pdf
versioned: http://www.arxiv.org/abs/1512.03385v1
export: export.arxiv.org/pdf/1512.03385
";
        assert_eq!(ids(text), vec!["1512.03385"; 4]);
        assert_eq!(
            distinct_ids(&extract_links(text)),
            vec![PaperIdentifier::new("1512.03385")]
        );
    }

    #[test]
    fn test_legacy_identifiers() {
        let text = "see https://arxiv.org/abs/hep-th/9901001 and http://xxx.lanl.gov/pdf/hep-th/9901001v2 \
                    and arxiv.org/abs/math.ag/0601001";
        assert_eq!(
            ids(text),
            vec!["hep-th/9901001", "hep-th/9901001", "math.AG/0601001"]
        );
    }

    #[test]
    fn test_spans_cover_the_raw_link_only() {
        let text = "Read https://arxiv.org/abs/1706.03762. Then (arxiv.org/pdf/1512.03385)!";
        let links = extract_links(text);
        assert_eq!(links.len(), 2);

        assert_eq!(&text[links[0].span.clone()], "https://arxiv.org/abs/1706.03762");
        assert_eq!(links[0].raw, "https://arxiv.org/abs/1706.03762");
        assert_eq!(&text[links[1].span.clone()], "arxiv.org/pdf/1512.03385");
        assert_eq!(links[1].url(), "https://arxiv.org/pdf/1512.03385");
    }

    #[test]
    fn test_markdown_link_targets_are_skipped() {
        let text = "**Deep Residual Learning for Image Recognition**. Kaiming He arXiv:cs.CV, 2015 \
                    ([source](https://arxiv.org/abs/1512.03385)) (Citations: N/A)\n\
                    [ResNet](https://arxiv.org/abs/1512.03385)\n\
                    [https://arxiv.org/abs/1706.03762](https://arxiv.org/abs/1706.03762)";
        assert!(extract_links(text).is_empty());
    }

    #[test]
    fn test_bracketed_link_outside_markdown_link_is_kept() {
        assert_eq!(
            ids("[https://arxiv.org/abs/1706.03762] and [see arxiv.org/abs/1512.03385](x)"),
            vec!["1706.03762", "1512.03385"]
        );
    }

    #[test]
    fn test_malformed_links_are_dropped() {
        let text = "https://arxiv.org/abs/12345 https://arxiv.org/list/cs.CV/recent \
                    https://arxiv.org/abs/1512.03385?context=cs https://notarxiv.org/abs/1512.03385";
        let links = extract_links(text);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].raw, "https://arxiv.org/abs/1512.03385?context=cs");
        assert_eq!(links[0].id.as_str(), "1512.03385");
    }

    #[test]
    fn test_host_is_case_insensitive() {
        assert_eq!(ids("HTTPS://ArXiv.Org/ABS/2301.04567v3"), vec!["2301.04567"]);
    }
}
