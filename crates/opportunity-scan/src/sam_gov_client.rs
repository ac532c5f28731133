use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::scan_types::{DetailRecord, FetchError, ListingPage};

/// Where full notice records are fetched from, keyed by notice id.
pub const DEFAULT_DETAIL_BASE_URL: &str = "https://sam.gov/api/prod/opps/v2/opportunities";

/// Media type the SAM.gov API answers with.
const SAMGOV_API_CONTENT_TYPE: &str = "application/hal+json";

/// Runs a (rewritten) search URL and decodes one page of results.
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    /// Fetch and decode the listing page at `url`.
    async fn fetch_page(&self, url: &str) -> Result<ListingPage, FetchError>;
}

/// Looks up the full record for one result.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    /// Fetch and decode the record for notice `id`.
    async fn fetch_detail(&self, id: &str) -> Result<DetailRecord, FetchError>;
}

/// Client for the SAM.gov opportunities API
pub struct SamGovClient {
    client: Client,
    detail_base_url: String,
}

impl SamGovClient {
    /// Create a new SAM.gov API client
    pub fn new(detail_base_url: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("sam-query-notifier/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            detail_base_url: detail_base_url
                .filter(|base| !base.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DETAIL_BASE_URL.to_string()),
        })
    }

    /// URL of the full record for notice `id`.
    pub fn detail_url(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.detail_base_url.trim_end_matches('/'),
            urlencoding::encode(id)
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, SAMGOV_API_CONTENT_TYPE)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ListingFetcher for SamGovClient {
    async fn fetch_page(&self, url: &str) -> Result<ListingPage, FetchError> {
        debug!("Fetching listing page {}", url);
        let page: ListingPage = self.get_json(url).await?;
        debug!(
            "Listing page {} of {} holds {} results",
            page.page.number + 1,
            page.page.total_pages,
            page.results.len()
        );
        Ok(page)
    }
}

#[async_trait]
impl DetailFetcher for SamGovClient {
    async fn fetch_detail(&self, id: &str) -> Result<DetailRecord, FetchError> {
        let url = self.detail_url(id);
        debug!("Fetching notice detail {}", url);
        self.get_json(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_url() {
        let client = SamGovClient::new(None).unwrap();
        assert_eq!(
            client.detail_url("abc123"),
            "https://sam.gov/api/prod/opps/v2/opportunities/abc123"
        );

        let local = SamGovClient::new(Some("http://localhost:9000/opps/".to_string())).unwrap();
        assert_eq!(local.detail_url("a/b"), "http://localhost:9000/opps/a%2Fb");

        let blank = SamGovClient::new(Some("  ".to_string())).unwrap();
        assert!(blank.detail_url("x").starts_with(DEFAULT_DETAIL_BASE_URL));
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let client = SamGovClient::new(None).unwrap();
        let result = client.fetch_page("http://127.0.0.1:9/search?q=x").await;
        assert!(matches!(result, Err(FetchError::Transport { .. })));
    }
}
