use async_trait::async_trait;
use reqwest::Client;

use crate::config::ScraperConfig;
use crate::error::{AppError, Context, Result};

pub mod request;

#[cfg(test)]
pub(crate) mod stub;

pub use request::{build_url, chart_url, quote_url};

/// Raw page body plus the URL that was actually requested.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
}

impl FetchedPage {
    /// Parse the body into a DOM tree. The tree is not `Send`; keep it off `.await` points.
    pub fn document(&self) -> scraper::Html {
        scraper::Html::parse_document(&self.body)
    }

    /// Query string of the resolved URL, used in diagnostics.
    pub fn query(&self) -> &str {
        self.url.split_once('?').map(|(_, q)| q).unwrap_or("")
    }
}

/// The HTTP collaborator: one GET per call, no retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_page(&self, url: &str, query: &[(String, String)]) -> Result<FetchedPage>;

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .default_headers(request::default_headers(&config.user_agent)?)
            .timeout(config.request_timeout())
            .build()
            .context("Failed to construct HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, url: reqwest::Url) -> Result<reqwest::Response> {
        let requested = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| AppError::FetchFailed {
                url: requested.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(AppError::UnexpectedStatus {
                url: requested,
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_page(&self, url: &str, query: &[(String, String)]) -> Result<FetchedPage> {
        let url = build_url(url, query)?;
        let requested = url.to_string();
        let response = self.send(url).await?;
        let body = response
            .text()
            .await
            .map_err(|source| AppError::FetchFailed {
                url: requested.clone(),
                source,
            })?;

        Ok(FetchedPage {
            url: requested,
            body,
        })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = build_url(url, &[])?;
        let response = self.send(parsed).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| AppError::FetchFailed {
                url: url.to_string(),
                source,
            })?;
        Ok(bytes.to_vec())
    }
}
