use tracing::warn;

use crate::sam_gov_client::DetailFetcher;
use crate::scan_types::{Description, ResultItem};

/// Public page for a notice.
pub const VIEW_URL_PREFIX: &str = "https://sam.gov/opp/";
/// Printed after every rendered result.
pub const RESULT_DIVIDER: &str = "\n---\n";

/// A rendered notification body and the results it covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Plain-text email body
    pub body: String,
    /// Identifiers rendered into `body`, in order
    pub result_ids: Vec<String>,
}

impl Summary {
    /// True when there is nothing worth sending.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Link to the public page of notice `id`.
pub fn view_url(id: &str) -> String {
    format!("{VIEW_URL_PREFIX}{id}/view")
}

/// Render `items`, enriching each with the full descriptions from `details`.
///
/// Details are only looked up for items the listing says have a description.
/// A failed lookup only costs that item its description lines.
pub async fn compose_summary(items: &[ResultItem], details: &dyn DetailFetcher) -> Summary {
    let mut summary = Summary::default();

    for item in items {
        let descriptions = if item.descriptions.is_empty() {
            Vec::new()
        } else {
            match details.fetch_detail(&item.id).await {
                Ok(record) => record.descriptions,
                Err(e) => {
                    warn!(
                        "Could not fetch details for {}, sending it without descriptions: {}",
                        item.id, e
                    );
                    Vec::new()
                }
            }
        };

        summary.body.push_str(&render_item(item, &descriptions));
        summary.result_ids.push(item.id.clone());
    }

    summary
}

/// One result block, divider included.
pub fn render_item(item: &ResultItem, descriptions: &[Description]) -> String {
    let mut lines = vec![
        format!("View on SAM: {}", view_url(&item.id)),
        format!("Title: {}", item.title.as_deref().unwrap_or("(untitled)")),
    ];

    lines.extend(
        descriptions
            .iter()
            .filter_map(|d| d.body.as_deref())
            .filter(|b| !b.trim().is_empty())
            .map(|body| format!("Description: {body}")),
    );

    lines.extend(
        item.organization_hierarchy
            .iter()
            .filter(|org| org.level == Some(1))
            .filter_map(|org| org.name.as_deref())
            .map(|name| format!("Organization: {name}")),
    );

    let mut block = lines.join("\n");
    block.push('\n');
    block.push_str(RESULT_DIVIDER);
    block
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::scan_types::{DetailRecord, FetchError, Organization};

    struct MockDetailFetcher {
        bodies: HashMap<String, Vec<&'static str>>,
        looked_up: Mutex<Vec<String>>,
    }

    impl MockDetailFetcher {
        fn new(bodies: HashMap<String, Vec<&'static str>>) -> Self {
            Self {
                bodies,
                looked_up: Mutex::new(Vec::new()),
            }
        }

        fn looked_up(&self) -> Vec<String> {
            self.looked_up.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DetailFetcher for MockDetailFetcher {
        async fn fetch_detail(&self, id: &str) -> Result<DetailRecord, FetchError> {
            self.looked_up.lock().unwrap().push(id.to_string());
            match self.bodies.get(id) {
                Some(bodies) => Ok(DetailRecord {
                    id: Some(id.to_string()),
                    descriptions: bodies
                        .iter()
                        .map(|b| Description {
                            body: Some(b.to_string()),
                            last_modified_date: None,
                        })
                        .collect(),
                }),
                None => Err(FetchError::Status {
                    url: format!("https://details/{id}"),
                    status: 404,
                }),
            }
        }
    }

    fn org(name: &str, level: i32) -> Organization {
        Organization {
            name: Some(name.to_string()),
            level: Some(level),
            ..Default::default()
        }
    }

    fn item(id: &str, title: &str) -> ResultItem {
        ResultItem {
            id: id.to_string(),
            title: Some(title.to_string()),
            organization_hierarchy: vec![org("DEPT OF DEFENSE", 1), org("AIR FORCE", 2)],
            descriptions: vec![Description {
                body: Some("abbreviated".to_string()),
                last_modified_date: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_render_item() {
        let block = render_item(
            &item("abc", "Rocket engines"),
            &[
                Description {
                    body: Some("Full text".to_string()),
                    last_modified_date: None,
                },
                Description::default(),
            ],
        );

        assert_eq!(
            block,
            "View on SAM: https://sam.gov/opp/abc/view\n\
             Title: Rocket engines\n\
             Description: Full text\n\
             Organization: DEPT OF DEFENSE\n\
             \n---\n"
        );
    }

    #[tokio::test]
    async fn test_empty_input_renders_nothing() {
        let fetcher = MockDetailFetcher::new(HashMap::new());
        let summary = compose_summary(&[], &fetcher).await;
        assert!(summary.is_empty());
        assert!(summary.result_ids.is_empty());
    }

    #[tokio::test]
    async fn test_detail_failure_only_skips_that_item() {
        let fetcher = MockDetailFetcher::new(HashMap::from([
            ("a".to_string(), vec!["Alpha full"]),
            ("c".to_string(), vec!["Gamma one", "Gamma two"]),
        ]));
        let items = [item("a", "Alpha"), item("b", "Beta"), item("c", "Gamma")];

        let summary = compose_summary(&items, &fetcher).await;

        assert_eq!(summary.result_ids, ["a", "b", "c"]);
        assert_eq!(summary.body.matches(RESULT_DIVIDER).count(), 3);
        assert!(summary.body.contains("Description: Alpha full\n"));
        assert!(summary.body.contains("Description: Gamma one\nDescription: Gamma two\n"));
        assert!(summary.body.contains(
            "Title: Beta\nOrganization: DEPT OF DEFENSE\n"
        ));
        assert!(!summary.body.contains("abbreviated"));
        assert!(!summary.body.contains("AIR FORCE"));
    }

    #[tokio::test]
    async fn test_items_without_descriptions_skip_detail_lookup() {
        let fetcher = MockDetailFetcher::new(HashMap::from([
            ("a".to_string(), vec!["Alpha full"]),
            ("b".to_string(), vec!["Beta full"]),
        ]));
        let bare = ResultItem {
            descriptions: Vec::new(),
            ..item("b", "Beta")
        };

        let summary = compose_summary(&[item("a", "Alpha"), bare], &fetcher).await;

        assert_eq!(fetcher.looked_up(), ["a"]);
        assert_eq!(summary.result_ids, ["a", "b"]);
        assert!(summary.body.contains("Description: Alpha full\n"));
        assert!(!summary.body.contains("Beta full"));
        assert!(summary.body.contains("Title: Beta\nOrganization: DEPT OF DEFENSE\n"));
    }
}
