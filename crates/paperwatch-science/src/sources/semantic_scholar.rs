use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use paperwatch_core::{PaperIdentifier, PaperMetadata};
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ScienceError};
use crate::http::{HttpOptions, RateLimitedClient};
use crate::sources::{BibliographicLookup, CitationLookup, LookupResult};

pub const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const CITATION_FIELDS: &str = "citationCount";
const PAPER_FIELDS: &str = "title,authors,year,venue,publicationVenue,citationCount";
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct S2PaperId(String);

impl S2PaperId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_arxiv(id: &PaperIdentifier) -> Self {
        Self::new(format!("arXiv:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for S2PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct S2Paper {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub citation_count: Option<u64>,
}

impl S2Paper {
    pub fn from_json(v: &Value) -> Result<Self> {
        let title = v
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        let authors = v
            .get("authors")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|author| author.get("name").and_then(Value::as_str))
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(ToOwned::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let year = v
            .get("year")
            .and_then(Value::as_i64)
            .and_then(|n| i32::try_from(n).ok());

        // `venue` is often empty for preprints; `publicationVenue.name` is
        // the structured form of the same field.
        let venue = non_empty(v.get("venue"))
            .or_else(|| non_empty(v.get("publicationVenue").and_then(|pv| pv.get("name"))));

        Ok(Self {
            title,
            authors,
            year,
            venue,
            citation_count: v.get("citationCount").and_then(Value::as_u64),
        })
    }
}

impl From<S2Paper> for LookupResult {
    fn from(paper: S2Paper) -> Self {
        LookupResult {
            metadata: PaperMetadata {
                title: paper.title,
                authors: paper.authors,
                venue: paper.venue,
                year: paper.year,
            },
            citation_count: paper.citation_count,
        }
    }
}

pub struct SemanticScholarSource {
    client: RateLimitedClient,
    api_key: Option<String>,
    base_url: String,
}

impl SemanticScholarSource {
    pub fn new(api_key: Option<String>, options: &HttpOptions) -> Result<Self> {
        Self::with_base_url(BASE_URL, api_key, options)
    }

    /// Authenticated callers get a tighter request spacing.
    pub fn with_base_url(
        base_url: &str,
        api_key: Option<String>,
        options: &HttpOptions,
    ) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let min_interval = if api_key.is_some() {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(1)
        };
        let options = options
            .clone()
            .with_min_interval(options.min_interval.min(min_interval));

        Ok(Self {
            client: RateLimitedClient::new(&options)?,
            api_key,
            base_url: base_url.to_string(),
        })
    }

    pub async fn fetch_citation_count(&self, id: &S2PaperId) -> Result<u64> {
        let json = self.fetch_json(id, CITATION_FIELDS).await?;
        json.get("citationCount")
            .and_then(Value::as_u64)
            .ok_or_else(|| ScienceError::Parse(format!("no citationCount for {id}")))
    }

    pub async fn fetch_paper(&self, id: &S2PaperId) -> Result<S2Paper> {
        let json = self.fetch_json(id, PAPER_FIELDS).await?;
        let paper = S2Paper::from_json(&json)?;
        if paper.title.is_empty() {
            return Err(ScienceError::Parse(format!("record for {id} has no title")));
        }
        Ok(paper)
    }

    async fn fetch_json(&self, id: &S2PaperId, fields: &str) -> Result<Value> {
        let mut url = parse_base_url(&self.base_url)?;
        {
            let mut segs = url.path_segments_mut().map_err(|_| {
                ScienceError::Parse("invalid Semantic Scholar base URL".to_string())
            })?;
            segs.push("paper");
            segs.push(id.as_str());
        }
        url.query_pairs_mut().append_pair("fields", fields);

        debug!(%id, fields, "semantic scholar request");
        let body = self
            .client
            .get_with_headers(url.as_str(), self.auth_headers()?)
            .await?;
        serde_json::from_str(&body).map_err(|e| ScienceError::Parse(e.to_string()))
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = self.api_key.as_deref() {
            let value =
                HeaderValue::from_str(key).map_err(|e| ScienceError::Parse(e.to_string()))?;
            headers.insert(API_KEY_HEADER, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl BibliographicLookup for SemanticScholarSource {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    async fn lookup(&self, id: &PaperIdentifier) -> Result<LookupResult> {
        self.fetch_paper(&S2PaperId::from_arxiv(id))
            .await
            .map(LookupResult::from)
    }
}

#[async_trait]
impl CitationLookup for SemanticScholarSource {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    async fn citation_count(&self, id: &PaperIdentifier) -> Result<u64> {
        self.fetch_citation_count(&S2PaperId::from_arxiv(id)).await
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    Url::parse(base_url).map_err(|e| ScienceError::Parse(format!("invalid URL {base_url}: {e}")))
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    #[test]
    fn falls_back_to_publication_venue_name() {
        let value = json!({
            "paperId": "2c03df8b",
            "title": "Deep Residual Learning for Image Recognition",
            "authors": [{"name": "Kaiming He"}, {"name": "X. Zhang"}],
            "year": 2015,
            "venue": "",
            "publicationVenue": {"name": "Computer Vision and Pattern Recognition"},
            "citationCount": 195432
        });

        let paper = S2Paper::from_json(&value).unwrap();
        assert_eq!(paper.authors, vec!["Kaiming He", "X. Zhang"]);
        assert_eq!(
            paper.venue.as_deref(),
            Some("Computer Vision and Pattern Recognition")
        );
        assert_eq!(paper.citation_count, Some(195432));
    }

    #[tokio::test]
    async fn test_citation_count_request() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/paper/arXiv:1512.03385")
            .match_query(Matcher::UrlEncoded(
                "fields".to_string(),
                "citationCount".to_string(),
            ))
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_body(r#"{"paperId":"2c03df8b","citationCount":195432}"#)
            .expect(1)
            .create_async()
            .await;

        let source = SemanticScholarSource::with_base_url(
            &server.url(),
            Some(" secret ".to_string()),
            &HttpOptions::for_tests(),
        )
        .unwrap();
        let count = source
            .citation_count(&PaperIdentifier::new("1512.03385"))
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(count, 195432);
    }

    #[tokio::test]
    async fn test_paper_lookup_carries_citation_count() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/paper/arXiv:1512.03385")
            .match_query(Matcher::UrlEncoded(
                "fields".to_string(),
                PAPER_FIELDS.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{"title":"Deep Residual Learning for Image Recognition",
                    "authors":[{"name":"Kaiming He"}],"year":2015,
                    "venue":"CVPR","citationCount":195432}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let source =
            SemanticScholarSource::with_base_url(&server.url(), None, &HttpOptions::for_tests())
                .unwrap();
        let result = source
            .lookup(&PaperIdentifier::new("1512.03385"))
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(result.metadata.venue.as_deref(), Some("CVPR"));
        assert_eq!(result.metadata.year, Some(2015));
        assert_eq!(result.citation_count, Some(195432));
    }

    #[tokio::test]
    async fn test_missing_paper_is_not_found() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/paper/arXiv:2401.99999")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":"Paper with id arXiv:2401.99999 not found"}"#)
            .create_async()
            .await;

        let source =
            SemanticScholarSource::with_base_url(&server.url(), None, &HttpOptions::for_tests())
                .unwrap();
        let err = source
            .lookup(&PaperIdentifier::new("2401.99999"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScienceError::NotFound(_)));
    }
}
