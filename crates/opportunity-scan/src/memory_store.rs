use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::query_store::QueryStore;
use crate::scan_types::{PersistError, ScanPage, StoredQuery};

/// Process-local [`QueryStore`] with the same paging and union semantics as
/// the Postgres store.
pub struct InMemoryQueryStore {
    queries: Mutex<BTreeMap<String, StoredQuery>>,
    page_size: usize,
}

impl InMemoryQueryStore {
    /// Empty store handing out `page_size` queries per scan page.
    pub fn new(page_size: usize) -> Self {
        Self {
            queries: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Insert or replace a query. Versioning starts at zero.
    pub async fn insert(&self, mut query: StoredQuery) {
        query.version.get_or_insert(0);
        self.queries.lock().await.insert(query.id.clone(), query);
    }

    /// Current state of one query.
    pub async fn get(&self, id: &str) -> Option<StoredQuery> {
        self.queries.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl QueryStore for InMemoryQueryStore {
    async fn scan_page(&self, token: Option<&str>) -> Result<ScanPage, PersistError> {
        let queries = self.queries.lock().await;

        let lower = match token {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Unbounded,
        };
        let items: Vec<StoredQuery> = queries
            .range((lower, Bound::Unbounded))
            .take(self.page_size)
            .map(|(_, query)| query.clone())
            .collect();

        let next_token = if items.len() == self.page_size {
            items.last().map(|query| query.id.clone())
        } else {
            None
        };

        Ok(ScanPage { items, next_token })
    }

    async fn commit_delivered_set(
        &self,
        query_id: &str,
        new_ids: &BTreeSet<String>,
    ) -> Result<(), PersistError> {
        let mut queries = self.queries.lock().await;
        let query = queries
            .get_mut(query_id)
            .ok_or_else(|| PersistError::NotFound(query_id.to_string()))?;

        let before = query.delivered_ids.len();
        query.delivered_ids.extend(new_ids.iter().cloned());
        if query.delivered_ids.len() != before {
            query.version = Some(query.version.unwrap_or(0) + 1);
            query.last_processed_at = Some(Utc::now());
        }

        Ok(())
    }
}
