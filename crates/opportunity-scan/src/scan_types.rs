use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use notification_services::NotificationError;
use serde::{Deserialize, Deserializer};

/// A persisted, user-owned search subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredQuery {
    /// Opaque identifier, stable across runs
    pub id: String,
    /// Address the digest is sent to
    pub recipient: String,
    /// Raw provider search URL, including its filter parameters
    pub query_url: String,
    /// Description the user gave the search, if any
    pub description: Option<String>,
    /// Result identifiers already notified for this query
    pub delivered_ids: BTreeSet<String>,
    /// When the delivered set was last committed
    pub last_processed_at: Option<DateTime<Utc>>,
    /// Optimistic version counter, when the store keeps one
    pub version: Option<i64>,
}

impl StoredQuery {
    /// Creates a query that has never delivered anything.
    pub fn new(
        id: impl Into<String>,
        recipient: impl Into<String>,
        query_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            recipient: recipient.into(),
            query_url: query_url.into(),
            description: None,
            delivered_ids: BTreeSet::new(),
            last_processed_at: None,
            version: None,
        }
    }

    /// Sets the user-facing description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Seeds the delivered set.
    pub fn with_delivered<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delivered_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// The user's description when it says something.
    pub fn user_description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// One page of the stored-query scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// Queries on this page
    pub items: Vec<StoredQuery>,
    /// Token to resubmit for the next page
    pub next_token: Option<String>,
}

impl ScanPage {
    /// Whether the store signalled another page.
    pub fn has_more(&self) -> bool {
        self.next_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Pagination metadata returned with a listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Requested page size
    #[serde(default)]
    pub size: u32,
    /// Total matching results across all pages
    #[serde(default)]
    pub total_elements: u64,
    /// Total number of pages
    #[serde(default)]
    pub total_pages: u32,
    /// Zero-based page number
    #[serde(default)]
    pub number: u32,
}

/// One page of provider results.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "RawListing")]
pub struct ListingPage {
    /// Results in provider order
    pub results: Vec<ResultItem>,
    /// Page metadata
    pub page: PageInfo,
}

impl ListingPage {
    /// Zero-based number of the page after this one, if the provider has more.
    pub fn next_page(&self) -> Option<u32> {
        let next = self.page.number.checked_add(1)?;
        (next < self.page.total_pages).then_some(next)
    }
}

#[derive(Deserialize)]
struct RawListing {
    #[serde(rename = "_embedded", default)]
    embedded: Option<RawEmbedded>,
    #[serde(default)]
    page: Option<PageInfo>,
}

#[derive(Deserialize)]
struct RawEmbedded {
    #[serde(default)]
    results: Option<Vec<ResultItem>>,
}

impl From<RawListing> for ListingPage {
    fn from(raw: RawListing) -> Self {
        Self {
            results: raw.embedded.and_then(|e| e.results).unwrap_or_default(),
            page: raw.page.unwrap_or_default(),
        }
    }
}

/// One candidate opportunity from a listing page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    /// Notice identifier; the only dedup key
    #[serde(rename = "_id")]
    pub id: String,
    /// Notice title
    #[serde(default)]
    pub title: Option<String>,
    /// Solicitation number
    #[serde(default)]
    pub solicitation_number: Option<String>,
    /// Publication date as sent by the provider
    #[serde(default)]
    pub publish_date: Option<String>,
    /// Last modification date
    #[serde(default)]
    pub modified_date: Option<String>,
    /// Response deadline
    #[serde(default)]
    pub response_date: Option<String>,
    /// Whether the notice was cancelled
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_canceled: bool,
    /// Whether the notice is active
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    /// Notice type
    #[serde(rename = "type", default)]
    pub notice_type: Option<NoticeType>,
    /// Owning organizations, outermost first
    #[serde(default, deserialize_with = "null_as_default")]
    pub organization_hierarchy: Vec<Organization>,
    /// Abbreviated descriptions
    #[serde(default, deserialize_with = "null_as_default")]
    pub descriptions: Vec<Description>,
    /// Award details for award notices
    #[serde(default)]
    pub award: Option<Award>,
}

/// Notice type code and label.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoticeType {
    /// Short code
    #[serde(default)]
    pub code: Option<String>,
    /// Display label
    #[serde(default)]
    pub value: Option<String>,
}

/// An entry of a notice's organization hierarchy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Provider organization id
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Organization name
    #[serde(default)]
    pub name: Option<String>,
    /// Depth in the hierarchy; 1 is the department
    #[serde(default)]
    pub level: Option<i32>,
    /// Organization type
    #[serde(rename = "type", default)]
    pub org_type: Option<String>,
    /// Organization status
    #[serde(default)]
    pub status: Option<String>,
}

/// A notice description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    /// Description text
    #[serde(default, alias = "content")]
    pub body: Option<String>,
    /// When the description last changed
    #[serde(default)]
    pub last_modified_date: Option<String>,
}

/// Award attached to an award notice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Award {
    /// Who received the award
    #[serde(default)]
    pub awardee: Option<Awardee>,
}

/// Award recipient.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Awardee {
    /// Awardee name
    #[serde(default)]
    pub name: Option<String>,
    /// Unique entity id
    #[serde(rename = "ueiSAM", default)]
    pub uei_sam: Option<String>,
}

/// Full notice record fetched by identifier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailRecord {
    /// Notice identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Full-text descriptions
    #[serde(rename = "description", default, deserialize_with = "null_as_default")]
    pub descriptions: Vec<Description>,
}

// The provider sends `null` for absent lists and flags as often as it omits them.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Failure fetching from the listing provider.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// The request never produced a response
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL
        url: String,
        /// Transport cause
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body was not the expected JSON
    #[error("could not decode response from {url}: {source}")]
    Decode {
        /// Requested URL
        url: String,
        /// Decode cause
        #[source]
        source: serde_json::Error,
    },
}

/// Failure reading or writing stored queries.
#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Another writer kept changing the row underneath us
    #[error("Version conflict committing query {query_id} after {attempts} attempts")]
    VersionConflict {
        /// Query being committed
        query_id: String,
        /// Attempts made
        attempts: u32,
    },

    /// The query no longer exists
    #[error("Stored query not found: {0}")]
    NotFound(String),

    /// Table name is not a plain identifier
    #[error("Invalid table name: {0:?}")]
    InvalidTable(String),
}

/// Failure processing a single stored query.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The stored URL could not be rewritten
    #[error("Malformed query URL: {0}")]
    MalformedQuery(String),

    /// Listing fetch failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The notification was not sent
    #[error("Send error: {0}")]
    Send(#[from] NotificationError),

    /// The delivered set was not committed
    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Failure that ends a whole run.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    /// The store scan itself failed
    #[error("Stored query scan failed: {0}")]
    Scan(#[source] PersistError),

    /// The store handed back a token it had already given
    #[error("Stored query scan repeated continuation token {0:?}")]
    RepeatedToken(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "_embedded": {
            "results": [
                {
                    "_id": "abc123",
                    "title": "Rocket engines",
                    "isCanceled": false,
                    "isActive": true,
                    "publishDate": "2026-10-15T10:00:00-04:00",
                    "type": {"code": "o", "value": "Solicitation"},
                    "organizationHierarchy": [
                        {"organizationId": "100", "name": "DEPT OF DEFENSE", "level": 1},
                        {"organizationId": "200", "name": "DEPT OF THE AIR FORCE", "level": 2}
                    ],
                    "descriptions": [{"content": "short", "lastModifiedDate": "2026-10-15"}],
                    "award": {"awardee": {"name": "ACME", "ueiSAM": "XYZ"}},
                    "_rScore": 12
                }
            ]
        },
        "page": {"size": 25, "totalElements": 26, "totalPages": 2, "number": 0}
    }"#;

    #[test]
    fn test_decode_listing_page() {
        let page: ListingPage = serde_json::from_str(LISTING).unwrap();

        assert_eq!(page.results.len(), 1);
        let item = &page.results[0];
        assert_eq!(item.id, "abc123");
        assert_eq!(item.title.as_deref(), Some("Rocket engines"));
        assert!(item.is_active);
        assert_eq!(item.organization_hierarchy[1].level, Some(2));
        assert_eq!(item.descriptions[0].body.as_deref(), Some("short"));
        assert_eq!(
            item.award
                .as_ref()
                .and_then(|a| a.awardee.as_ref())
                .and_then(|a| a.uei_sam.as_deref()),
            Some("XYZ")
        );
        assert_eq!(page.page.total_pages, 2);
        assert_eq!(page.next_page(), Some(1));
    }

    #[test]
    fn test_decode_listing_without_results() {
        let page: ListingPage = serde_json::from_str(r#"{"page": {"number": 0}}"#).unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.next_page(), None);

        let page: ListingPage = serde_json::from_str(r#"{"_embedded": {}}"#).unwrap();
        assert!(page.results.is_empty());

        let page: ListingPage = serde_json::from_str(
            r#"{"_embedded": {"results": [{"_id": "n1", "descriptions": null, "isActive": null}]}}"#,
        )
        .unwrap();
        assert!(page.results[0].descriptions.is_empty());
        assert!(!page.results[0].is_active);
    }

    #[test]
    fn test_decode_detail_record() {
        let detail: DetailRecord = serde_json::from_str(
            r#"{"id": "abc123", "description": [{"body": "Full text", "lastModifiedDate": "x"}]}"#,
        )
        .unwrap();
        assert_eq!(detail.descriptions.len(), 1);
        assert_eq!(detail.descriptions[0].body.as_deref(), Some("Full text"));
    }

    #[test]
    fn test_scan_page_has_more() {
        let mut page = ScanPage::default();
        assert!(!page.has_more());
        page.next_token = Some(String::new());
        assert!(!page.has_more());
        page.next_token = Some("q-10".to_string());
        assert!(page.has_more());
    }

    #[test]
    fn test_user_description_ignores_blank() {
        let query = StoredQuery::new("1", "a@b.co", "https://x?q=y");
        assert_eq!(query.user_description(), None);
        assert_eq!(query.clone().with_description("   ").user_description(), None);
        assert_eq!(
            query.with_description(" Rockets ").user_description(),
            Some("Rockets")
        );
    }
}
