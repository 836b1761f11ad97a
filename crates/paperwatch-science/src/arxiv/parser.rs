use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::arxiv::types::ArxivMetadata;
use crate::error::{Result, ScienceError};
use crate::identifiers::arxiv::ArxivId;

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    published: String,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "arxiv:primary_category", alias = "primary_category")]
    primary_category: Option<AtomCategory>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

/// Parse an arXiv API Atom feed. Error entries (which the API emits for
/// malformed ids) are dropped, so an unknown paper yields an empty list.
pub fn parse_atom_response(xml: &str) -> Result<Vec<ArxivMetadata>> {
    let feed: AtomFeed =
        from_str(xml).map_err(|e| ScienceError::Parse(format!("invalid atom xml: {e}")))?;

    feed.entries
        .into_iter()
        .filter(|entry| !is_error_entry(entry))
        .map(parse_entry)
        .collect()
}

fn is_error_entry(entry: &AtomEntry) -> bool {
    entry.id.contains("/api/errors")
}

fn parse_entry(entry: AtomEntry) -> Result<ArxivMetadata> {
    let arxiv_id = ArxivId::parse(entry.id.trim())
        .map_err(|_| ScienceError::Parse(format!("invalid arXiv id in entry: {}", entry.id)))?;

    let title = clean_text(&entry.title);
    if title.is_empty() {
        return Err(ScienceError::Parse(format!(
            "entry {} has no title",
            arxiv_id.id
        )));
    }

    let published = parse_rfc3339(&entry.published, "published")?;

    let authors = entry
        .authors
        .into_iter()
        .map(|author| clean_text(&author.name))
        .filter(|name| !name.is_empty())
        .collect();

    // Older entries sometimes lack the primary category element.
    let primary_category = entry
        .primary_category
        .into_iter()
        .chain(entry.categories)
        .find_map(|category| clean_optional(category.term))
        .unwrap_or_default();

    Ok(ArxivMetadata {
        arxiv_id,
        title,
        authors,
        published,
        primary_category,
    })
}

fn parse_rfc3339(value: &str, field_name: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ScienceError::Parse(format!("invalid {field_name} datetime: {e}")))
}

fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| clean_text(&v)).filter(|v| !v.is_empty())
}
