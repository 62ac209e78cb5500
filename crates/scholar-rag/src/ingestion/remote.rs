//! Download papers from a URL for import

use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::time::Duration;

use crate::error::{Error, Result};

/// A downloaded file, ready for [`ProcessingWorker::accept`](crate::processing::ProcessingWorker::accept)
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// HTTP(S) downloader with a byte ceiling
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    http: reqwest::Client,
    max_bytes: usize,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, max_bytes })
    }

    /// Fetch `url`. The body is read chunk by chunk and abandoned as soon as
    /// it passes the size limit.
    pub async fn fetch(&self, url: &str, filename: Option<&str>) -> Result<RemoteFile> {
        let parsed = Url::parse(url.trim()).map_err(|e| Error::invalid(format!("Invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::invalid(format!("Only http and https URLs can be imported, got '{}'", parsed.scheme())));
        }

        let mut response = self
            .http
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| Error::invalid(format!("Download of {} failed: {}", parsed, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::invalid(format!("Download of {} failed with status {}", parsed, status)));
        }
        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(self.too_large(&parsed, len as usize));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        let mut data = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::invalid(format!("Download of {} was interrupted: {}", parsed, e)))?
        {
            if data.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(&parsed, data.len() + chunk.len()));
            }
            data.extend_from_slice(&chunk);
        }

        let filename = filename
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| filename_from_url(&parsed));
        tracing::info!("Downloaded {} ({} bytes) as '{}'", parsed, data.len(), filename);
        Ok(RemoteFile {
            filename,
            content_type,
            data,
        })
    }

    fn too_large(&self, url: &Url, seen: usize) -> Error {
        Error::invalid(format!(
            "{} is larger than the {} byte limit (at least {} bytes)",
            url, self.max_bytes, seen
        ))
    }
}

/// Last non-empty path segment, or the host
fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_else(|| "download".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url() {
        let url = Url::parse("https://arxiv.org/pdf/2101.00001.pdf").unwrap();
        assert_eq!(filename_from_url(&url), "2101.00001.pdf");
        let url = Url::parse("https://example.org/papers/").unwrap();
        assert_eq!(filename_from_url(&url), "papers");
        let url = Url::parse("https://example.org").unwrap();
        assert_eq!(filename_from_url(&url), "example.org");
    }

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        let fetcher = RemoteFetcher::new(Duration::from_secs(1), 1024).unwrap();
        let err = fetcher.fetch("file:///etc/passwd", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        let err = fetcher.fetch("not a url", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
