use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::scan_types::{PersistError, ScanPage, StoredQuery};

/// Default number of stored queries read per scan page.
pub const DEFAULT_SCAN_PAGE_SIZE: u32 = 100;

/// How many times a commit is retried after losing an optimistic version race.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Access contract for persisted saved queries.
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Read one page of stored queries, starting after `token` (or at the
    /// beginning when `None`).
    async fn scan_page(&self, token: Option<&str>) -> Result<ScanPage, PersistError>;

    /// Add `new_ids` to the delivered set of `query_id`.
    ///
    /// Set union: existing members are never removed or duplicated, so
    /// repeating a commit, or committing overlapping sets in any order, is safe.
    async fn commit_delivered_set(
        &self,
        query_id: &str,
        new_ids: &BTreeSet<String>,
    ) -> Result<(), PersistError>;
}

/// Merge newly delivered identifiers into a query's persisted set.
///
/// Returns `Ok(false)` without touching the store when there is nothing to add.
pub async fn merge_delivered(
    store: &dyn QueryStore,
    query_id: &str,
    new_ids: &[String],
) -> Result<bool, PersistError> {
    if new_ids.is_empty() {
        return Ok(false);
    }

    let new_ids: BTreeSet<String> = new_ids.iter().cloned().collect();
    store.commit_delivered_set(query_id, &new_ids).await?;
    Ok(true)
}

/// Saved queries kept in a Postgres table.
///
/// Expected shape:
///
/// ```sql
/// CREATE TABLE saved_queries (
///     id                TEXT PRIMARY KEY,
///     email             TEXT NOT NULL,
///     query             TEXT NOT NULL,
///     user_description  TEXT,
///     email_sent        TEXT[],
///     last_processed_at TIMESTAMPTZ,
///     version           BIGINT NOT NULL DEFAULT 0
/// );
/// ```
pub struct PgQueryStore {
    pool: PgPool,
    table: String,
    page_size: u32,
}

#[derive(Debug, sqlx::FromRow)]
struct StoredQueryRow {
    id: String,
    email: String,
    query: String,
    user_description: Option<String>,
    email_sent: Option<Vec<String>>,
    last_processed_at: Option<DateTime<Utc>>,
    version: i64,
}

impl From<StoredQueryRow> for StoredQuery {
    fn from(row: StoredQueryRow) -> Self {
        Self {
            id: row.id,
            recipient: row.email,
            query_url: row.query,
            description: row.user_description,
            delivered_ids: row.email_sent.unwrap_or_default().into_iter().collect(),
            last_processed_at: row.last_processed_at,
            version: Some(row.version),
        }
    }
}

impl PgQueryStore {
    /// Create a store over `table`, reading `page_size` queries per page.
    pub fn new(
        pool: PgPool,
        table: impl Into<String>,
        page_size: u32,
    ) -> Result<Self, PersistError> {
        let table = table.into();
        if !is_plain_table_name(&table) {
            return Err(PersistError::InvalidTable(table));
        }

        Ok(Self {
            pool,
            table,
            page_size: page_size.max(1),
        })
    }

    /// Table the store reads and writes.
    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl QueryStore for PgQueryStore {
    async fn scan_page(&self, token: Option<&str>) -> Result<ScanPage, PersistError> {
        let sql = format!(
            r#"
            SELECT id, email, query, user_description, email_sent, last_processed_at, version
            FROM {}
            WHERE ($1::TEXT IS NULL OR id > $1)
            ORDER BY id
            LIMIT $2
            "#,
            self.table
        );

        let rows: Vec<StoredQueryRow> = sqlx::query_as(&sql)
            .bind(token)
            .bind(i64::from(self.page_size))
            .fetch_all(&self.pool)
            .await?;

        let next_token = if rows.len() == self.page_size as usize {
            rows.last().map(|row| row.id.clone())
        } else {
            None
        };

        Ok(ScanPage {
            items: rows.into_iter().map(StoredQuery::from).collect(),
            next_token,
        })
    }

    async fn commit_delivered_set(
        &self,
        query_id: &str,
        new_ids: &BTreeSet<String>,
    ) -> Result<(), PersistError> {
        let select_sql = format!("SELECT email_sent, version FROM {} WHERE id = $1", self.table);
        let update_sql = format!(
            r#"
            UPDATE {}
            SET email_sent = $1,
                version = version + 1,
                last_processed_at = NOW()
            WHERE id = $2 AND version = $3
            "#,
            self.table
        );

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let row: Option<(Option<Vec<String>>, i64)> = sqlx::query_as(&select_sql)
                .bind(query_id)
                .fetch_optional(&self.pool)
                .await?;

            let (current, version) =
                row.ok_or_else(|| PersistError::NotFound(query_id.to_string()))?;

            let mut merged: BTreeSet<String> = current.unwrap_or_default().into_iter().collect();
            let before = merged.len();
            merged.extend(new_ids.iter().cloned());

            if merged.len() == before {
                debug!("Query {} already has every delivered id", query_id);
                return Ok(());
            }

            let result = sqlx::query(&update_sql)
                .bind(merged.into_iter().collect::<Vec<String>>())
                .bind(query_id)
                .bind(version)
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 1 {
                debug!(
                    "Committed delivered set for {} at version {}",
                    query_id,
                    version + 1
                );
                return Ok(());
            }

            warn!(
                "Version {} of query {} changed underneath us (attempt {}/{})",
                version, query_id, attempt, MAX_COMMIT_ATTEMPTS
            );
        }

        Err(PersistError::VersionConflict {
            query_id: query_id.to_string(),
            attempts: MAX_COMMIT_ATTEMPTS,
        })
    }
}

/// `name` or `schema.name`, each part a plain SQL identifier.
fn is_plain_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                && part.len() <= 63
        })
}
