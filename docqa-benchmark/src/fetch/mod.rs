//! Source document fetching with bounded retries

pub mod extract;

pub use extract::{classify, decode_text, extract_html_text, extract_pdf_text, DocumentFormat};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::FetchConfig;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";

/// Text extracted from a fetched link
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub format: DocumentFormat,
    pub source_url: String,
}

/// Error types for document fetching
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed after {attempts} attempt(s): {source}")]
    Network {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status} after {attempts} attempt(s)")]
    ServerError {
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Unsupported content type: {mime}")]
    UnsupportedContentType { mime: String },

    #[error("Failed to extract text: {0}")]
    Extraction(String),

    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Anything that can turn a link into a [`Document`].
///
/// `Ok(None)` means the link resolved to "no document" (HTTP 404).
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult<Option<Document>>;
}

/// HTTP fetcher with browser-like headers and a fixed-delay retry loop
pub struct HttpFetcher {
    http_client: Client,
    attempts: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> FetchResult<Self> {
        let mut builder = Client::builder().default_headers(browser_headers());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(FetchError::Client)?;

        Ok(Self {
            http_client,
            attempts: config.attempts.max(1),
            retry_delay: config.retry_delay(),
        })
    }

    /// Override the retry policy
    pub fn with_retries(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// GET the URL, retrying transport failures and 5xx responses.
    ///
    /// Returns the content-type header and body, or `None` on 404.
    async fn fetch_bytes(&self, url: &str) -> FetchResult<Option<(Option<String>, Vec<u8>)>> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::info!("Fetching {} (attempt {}/{})", url, attempt, self.attempts);

            let failure = match self.http_client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    tracing::debug!("{} -> HTTP {}", url, status.as_u16());

                    if status == StatusCode::NOT_FOUND {
                        tracing::warn!("404 Not Found for {}", url);
                        return Ok(None);
                    }

                    if status.is_success() {
                        let content_type = response
                            .headers()
                            .get(CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .map(|s| s.to_string());
                        match response.bytes().await {
                            Ok(body) => return Ok(Some((content_type, body.to_vec()))),
                            Err(e) => FetchError::Network {
                                url: url.to_string(),
                                attempts: attempt,
                                source: e,
                            },
                        }
                    } else if status.is_server_error() {
                        FetchError::ServerError {
                            url: url.to_string(),
                            status: status.as_u16(),
                            attempts: attempt,
                        }
                    } else {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                }
                Err(e) => FetchError::Network {
                    url: url.to_string(),
                    attempts: attempt,
                    source: e,
                },
            };

            if attempt >= self.attempts {
                tracing::error!("Giving up on {}: {}", url, failure);
                return Err(failure);
            }

            tracing::warn!(
                "Fetch of {} failed ({}), retrying in {}ms",
                url,
                failure,
                self.retry_delay.as_millis()
            );
            sleep(self.retry_delay).await;
        }
    }
}

#[async_trait]
impl DocumentSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<Option<Document>> {
        let Some((content_type, body)) = self.fetch_bytes(url).await? else {
            return Ok(None);
        };

        let format = classify(content_type.as_deref(), url)?;
        let text = match format {
            DocumentFormat::Pdf => extract_pdf_text(&body)?,
            DocumentFormat::Html => {
                extract_html_text(&decode_text(&body, content_type.as_deref()))
            }
            DocumentFormat::PlainText => decode_text(&body, content_type.as_deref()),
        };

        tracing::info!("Extracted {} chars of {} from {}", text.len(), format, url);

        Ok(Some(Document {
            text,
            format,
            source_url: url.to_string(),
        }))
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
    headers
}
