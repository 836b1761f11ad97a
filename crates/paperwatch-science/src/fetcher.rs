//! PDF download into the flat asset directory.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use paperwatch_core::{PaperIdentifier, PaperMetadata};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, ScienceError};
use crate::http::{HttpOptions, RateLimitedClient};

pub const PDF_BASE_URL: &str = "https://arxiv.org/pdf";
const MAX_TITLE_CHARS: usize = 80;

pub struct AssetFetcher {
    client: RateLimitedClient,
    pdf_base_url: String,
    pdf_dir: PathBuf,
}

impl AssetFetcher {
    pub fn new(pdf_dir: impl Into<PathBuf>, options: &HttpOptions) -> Result<Self> {
        Self::with_base_url(PDF_BASE_URL, pdf_dir, options)
    }

    pub fn with_base_url(
        pdf_base_url: &str,
        pdf_dir: impl Into<PathBuf>,
        options: &HttpOptions,
    ) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(options)?,
            pdf_base_url: pdf_base_url.trim_end_matches('/').to_string(),
            pdf_dir: pdf_dir.into(),
        })
    }

    pub fn pdf_dir(&self) -> &Path {
        &self.pdf_dir
    }

    /// Where the PDF for `metadata` lives (or will live).
    pub fn target_path(&self, metadata: &PaperMetadata) -> PathBuf {
        self.pdf_dir.join(pdf_file_name(metadata))
    }

    /// Make sure the PDF for `id` is on disk and return its path.
    ///
    /// An existing file is returned without touching the network. Otherwise
    /// the body is streamed into a temp file next to the target and renamed
    /// into place once complete, so a partial download is never visible.
    pub async fn fetch(&self, id: &PaperIdentifier, metadata: &PaperMetadata) -> Result<PathBuf> {
        let target = self.target_path(metadata);
        if target.is_file() {
            debug!(%id, path = %target.display(), "pdf already on disk");
            return Ok(target);
        }

        tokio::fs::create_dir_all(&self.pdf_dir).await?;
        let url = format!("{}/{}", self.pdf_base_url, id);
        let response = self.client.get_response(&url, HeaderMap::new()).await?;

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/html"));
        if is_html {
            return Err(ScienceError::Download(format!("{url} returned an HTML page")));
        }

        // The temp path is removed on drop unless persisted.
        let (file, tmp_path) = tempfile::Builder::new()
            .prefix(".paperwatch-")
            .suffix(".part")
            .tempfile_in(&self.pdf_dir)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ScienceError::Download(format!("{url}: {e}")))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        if written == 0 {
            return Err(ScienceError::Download(format!("{url} returned an empty body")));
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tmp_path
            .persist(&target)
            .map_err(|e| ScienceError::Io(e.error))?;
        info!(%id, bytes = written, path = %target.display(), "pdf downloaded");
        Ok(target)
    }
}

/// `{surname}_{year}_{title}.pdf`, with the title cut to 80 characters and
/// everything unsafe in a file name removed.
pub fn pdf_file_name(metadata: &PaperMetadata) -> String {
    let surname = metadata
        .authors
        .first()
        .and_then(|author| author.split_whitespace().last())
        .map(sanitize)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let year = metadata
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let title: String = sanitize(&metadata.title)
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let title = trim_name_end(&title);

    format!("{surname}_{year}_{title}.pdf")
}

fn sanitize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect();
    trim_name_end(&cleaned).to_string()
}

fn trim_name_end(s: &str) -> &str {
    s.trim_end_matches(|c: char| c.is_whitespace() || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::fakes::resnet;
    use mockito::Server;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_pdf_file_name() {
        assert_eq!(
            pdf_file_name(&resnet()),
            "He_2015_Deep Residual Learning for Image Recognition.pdf"
        );
    }

    #[test]
    fn test_pdf_file_name_strips_unsafe_characters() {
        let metadata = PaperMetadata {
            title: "What/is: \"attention\"? A <survey> | part\t2...  ".to_string(),
            authors: vec![],
            venue: None,
            year: None,
        };
        assert_eq!(
            pdf_file_name(&metadata),
            "Unknown_Unknown_Whatis attention A survey  part2.pdf"
        );
    }

    #[test]
    fn test_pdf_file_name_truncates_long_titles() {
        let metadata = PaperMetadata {
            title: "x".repeat(200),
            ..resnet()
        };
        let name = pdf_file_name(&metadata);
        assert_eq!(name, format!("He_2015_{}.pdf", "x".repeat(80)));
    }

    #[tokio::test]
    async fn test_download_streams_into_place() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/pdf/1512.03385")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(b"%PDF-1.5 body")
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = AssetFetcher::with_base_url(
            &format!("{}/pdf", server.url()),
            dir.path().join("pdfs"),
            &HttpOptions::for_tests(),
        )
        .unwrap();

        let path = fetcher
            .fetch(&PaperIdentifier::new("1512.03385"), &resnet())
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(path, fetcher.target_path(&resnet()));
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.5 body");
        assert_eq!(fs::read_dir(dir.path().join("pdfs")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_existing_pdf_makes_no_request() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher =
            AssetFetcher::with_base_url(&server.url(), dir.path(), &HttpOptions::for_tests())
                .unwrap();
        let existing = fetcher.target_path(&resnet());
        fs::write(&existing, b"%PDF").unwrap();

        let path = fetcher
            .fetch(&PaperIdentifier::new("1512.03385"), &resnet())
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(path, existing);
    }

    #[tokio::test]
    async fn test_html_and_empty_bodies_are_rejected() {
        let mut server = Server::new_async().await;
        let _html = server
            .mock("GET", "/2401.00001")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html>captcha</html>")
            .create_async()
            .await;
        let _empty = server
            .mock("GET", "/2401.00002")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher =
            AssetFetcher::with_base_url(&server.url(), dir.path(), &HttpOptions::for_tests())
                .unwrap();

        let err = fetcher
            .fetch(&PaperIdentifier::new("2401.00001"), &resnet())
            .await
            .unwrap_err();
        assert!(matches!(err, ScienceError::Download(_)));

        let err = fetcher
            .fetch(&PaperIdentifier::new("2401.00002"), &resnet())
            .await
            .unwrap_err();
        assert!(matches!(err, ScienceError::Download(_)));
        assert!(!fetcher.target_path(&resnet()).exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
