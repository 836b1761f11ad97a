use std::time::Duration;

use async_trait::async_trait;
use paperwatch_core::{PaperIdentifier, PaperMetadata};
use reqwest::Url;
use reqwest::header::HeaderMap;

use crate::arxiv::parser::parse_atom_response;
use crate::arxiv::types::ArxivMetadata;
use crate::error::{Result, ScienceError};
use crate::http::{HttpOptions, RateLimitedClient};
use crate::sources::{BibliographicLookup, LookupResult};

pub const BASE_URL: &str = "https://export.arxiv.org/api/query";

/// arXiv asks API users to keep at least three seconds between calls.
const MIN_INTERVAL: Duration = Duration::from_secs(3);

pub struct ArxivClient {
    client: RateLimitedClient,
    base_url: String,
}

impl ArxivClient {
    pub fn new(options: &HttpOptions) -> Result<Self> {
        Self::with_base_url(BASE_URL, options)
    }

    pub fn with_base_url(base_url: &str, options: &HttpOptions) -> Result<Self> {
        let options = options.clone().with_min_interval(options.min_interval.max(MIN_INTERVAL));
        Self::with_params(base_url, &options)
    }

    /// No interval floor; for tests against a local server.
    pub fn with_params(base_url: &str, options: &HttpOptions) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(options)?,
            base_url: base_url.to_string(),
        })
    }

    pub async fn fetch_metadata(&self, id: &PaperIdentifier) -> Result<ArxivMetadata> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ScienceError::Parse(format!("invalid URL {}: {e}", self.base_url)))?;
        url.query_pairs_mut().append_pair("id_list", id.as_str());

        let xml = self.client.get_with_headers(url.as_str(), HeaderMap::new()).await?;
        let results = parse_atom_response(&xml)?;

        results
            .into_iter()
            .find(|entry| entry.arxiv_id.canonical() == *id)
            .ok_or_else(|| ScienceError::NotFound(format!("arXiv has no entry for {id}")))
    }
}

#[async_trait]
impl BibliographicLookup for ArxivClient {
    fn name(&self) -> &str {
        "arxiv"
    }

    async fn lookup(&self, id: &PaperIdentifier) -> Result<LookupResult> {
        let metadata = self.fetch_metadata(id).await?;
        Ok(PaperMetadata::from(metadata).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const ATTENTION_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/1706.03762v5</id>
    <updated>2023-08-02T03:09:44Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All You Need</title>
    <summary>Abstract</summary>
    <author><name>Ashish Vaswani</name></author>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.CL"/>
    <category term="cs.CL"/>
  </entry>
</feed>"#;

    #[tokio::test]
    async fn test_arxiv_client_fetch_metadata() {
        let mut server = Server::new_async().await;

        let m = server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded(
                "id_list".to_string(),
                "1706.03762".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(ATTENTION_XML)
            .expect(1)
            .create_async()
            .await;

        let client =
            ArxivClient::with_params(&format!("{}/query", server.url()), &HttpOptions::for_tests())
                .unwrap();
        let result = client.lookup(&PaperIdentifier::new("1706.03762")).await.unwrap();

        m.assert_async().await;
        assert_eq!(result.citation_count, None);
        let metadata = result.metadata;
        assert_eq!(metadata.title, "Attention Is All You Need");
        assert_eq!(metadata.authors, vec!["Ashish Vaswani".to_string()]);
        assert_eq!(metadata.venue.as_deref(), Some("arXiv:cs.CL"));
        assert_eq!(metadata.year, Some(2017));
    }

    #[tokio::test]
    async fn test_empty_feed_is_not_found() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#)
            .create_async()
            .await;

        let client =
            ArxivClient::with_params(&format!("{}/query", server.url()), &HttpOptions::for_tests())
                .unwrap();
        let err = client
            .lookup(&PaperIdentifier::new("9912.99999"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScienceError::NotFound(_)));
    }
}
