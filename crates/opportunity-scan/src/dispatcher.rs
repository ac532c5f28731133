use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::dedup::filter_undelivered;
use crate::email_service::NotificationSender;
use crate::query_describer::{describe_search_inline, describe_url};
use crate::query_store::{QueryStore, merge_delivered};
use crate::sam_gov_client::{DetailFetcher, ListingFetcher};
use crate::scan_types::{DispatchError, ListingPage, ScanError, StoredQuery};
use crate::summary::compose_summary;
use crate::url_window::UrlWindowRewriter;

/// Start of every notification subject.
pub const SUBJECT_PREFIX: &str = "New SAM.gov results";

/// Step of the per-query pipeline a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    /// URL rewrite and listing fetch
    Fetch,
    /// Handing the digest to the mail transport
    Send,
    /// Committing the delivered set
    Persist,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryStage::Fetch => "fetch",
            QueryStage::Send => "send",
            QueryStage::Persist => "persist",
        })
    }
}

/// How one stored query ended within a run.
#[derive(Debug)]
pub enum QueryOutcome {
    /// Nothing undelivered; no email, no write
    NothingNew,
    /// Digest sent and delivered set committed
    Delivered {
        /// Results in the digest
        results: usize,
    },
    /// The pipeline stopped early
    Errored {
        /// Where it stopped
        stage: QueryStage,
        /// Why
        error: ScanError,
    },
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Store pages scanned
    pub pages: usize,
    /// Stored queries processed
    pub queries: usize,
    /// Queries that got a digest
    pub delivered: usize,
    /// Queries with nothing new
    pub nothing_new: usize,
    /// Queries that failed
    pub errored: usize,
    /// Results notified across all digests
    pub results_notified: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &QueryOutcome) {
        self.queries += 1;
        match outcome {
            QueryOutcome::NothingNew => self.nothing_new += 1,
            QueryOutcome::Delivered { results } => {
                self.delivered += 1;
                self.results_notified += results;
            }
            QueryOutcome::Errored { .. } => self.errored += 1,
        }
    }
}

/// Runs every stored query once: rewrite, fetch, filter, compose, send, persist.
///
/// Queries are handled one after another. A failing query is logged and
/// skipped; only a failure of the store scan itself ends the run.
pub struct NotificationDispatcher {
    store: Arc<dyn QueryStore>,
    listings: Arc<dyn ListingFetcher>,
    details: Arc<dyn DetailFetcher>,
    sender: Arc<dyn NotificationSender>,
    rewriter: UrlWindowRewriter,
}

impl NotificationDispatcher {
    /// Wire a dispatcher from its collaborators.
    pub fn new(
        store: Arc<dyn QueryStore>,
        listings: Arc<dyn ListingFetcher>,
        details: Arc<dyn DetailFetcher>,
        sender: Arc<dyn NotificationSender>,
        rewriter: UrlWindowRewriter,
    ) -> Self {
        Self {
            store,
            listings,
            details,
            sender,
            rewriter,
        }
    }

    /// One run against the wall clock.
    pub async fn run(&self) -> Result<RunSummary, DispatchError> {
        self.run_at(Utc::now()).await
    }

    /// One run in which every query's window is computed from `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary, DispatchError> {
        info!(
            "Starting notification run, window from {}",
            self.rewriter.window_start(now)
        );

        let mut summary = RunSummary::default();
        let mut token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let page = self
                .store
                .scan_page(token.as_deref())
                .await
                .map_err(DispatchError::Scan)?;
            summary.pages += 1;
            debug!(
                "Scan page {} holds {} stored queries",
                summary.pages,
                page.items.len()
            );

            for query in &page.items {
                let outcome = self.process_query(query, now).await;
                summary.record(&outcome);
            }

            if !page.has_more() {
                break;
            }

            let next = page.next_token.unwrap_or_default();
            if !seen_tokens.insert(next.clone()) {
                return Err(DispatchError::RepeatedToken(next));
            }
            token = Some(next);
        }

        info!(
            "Run finished: {} queries over {} pages, {} delivered ({} results), {} with nothing new, {} errored",
            summary.queries,
            summary.pages,
            summary.delivered,
            summary.results_notified,
            summary.nothing_new,
            summary.errored
        );

        Ok(summary)
    }

    /// Take one stored query through the pipeline.
    pub async fn process_query(&self, query: &StoredQuery, now: DateTime<Utc>) -> QueryOutcome {
        debug!("Query {}:\n{}", query.id, describe_url(&query.query_url));

        let page = match self.fetch(query, now).await {
            Ok(page) => page,
            Err(e) => return errored(query, QueryStage::Fetch, e),
        };

        let fetched = page.results.len();
        let fresh = filter_undelivered(page.results, &query.delivered_ids);
        if fresh.is_empty() {
            info!(
                "Query {}: nothing new ({} results, all delivered before)",
                query.id, fetched
            );
            return QueryOutcome::NothingNew;
        }

        let summary = compose_summary(&fresh, self.details.as_ref()).await;
        if summary.is_empty() {
            info!("Query {}: empty digest, not sending", query.id);
            return QueryOutcome::NothingNew;
        }

        let subject = subject_for(query);
        match self
            .sender
            .send(&query.recipient, &subject, &summary.body)
            .await
        {
            Ok(message_id) => info!(
                "Query {}: sent {} new results to {} ({})",
                query.id,
                summary.result_ids.len(),
                query.recipient,
                message_id
            ),
            Err(e) => return errored(query, QueryStage::Send, e.into()),
        }

        match merge_delivered(self.store.as_ref(), &query.id, &summary.result_ids).await {
            Ok(_) => QueryOutcome::Delivered {
                results: summary.result_ids.len(),
            },
            Err(e) => {
                error!(
                    "Query {}: {} results were emailed to {} but could not be recorded; \
                     they will be sent again next run: {}",
                    query.id,
                    summary.result_ids.len(),
                    query.recipient,
                    e
                );
                QueryOutcome::Errored {
                    stage: QueryStage::Persist,
                    error: e.into(),
                }
            }
        }
    }

    async fn fetch(&self, query: &StoredQuery, now: DateTime<Utc>) -> Result<ListingPage, ScanError> {
        let url = self.rewriter.rewrite_at(&query.query_url, now)?;
        debug!("Query {}: fetching {}", query.id, url);

        let page = self.listings.fetch_page(&url).await?;
        if page.next_page().is_some() {
            warn!(
                "Query {}: {} results match but only the first {} are checked this run",
                query.id,
                page.page.total_elements,
                page.results.len()
            );
        }
        Ok(page)
    }
}

fn errored(query: &StoredQuery, stage: QueryStage, error: ScanError) -> QueryOutcome {
    error!("Query {} failed at {}: {}", query.id, stage, error);
    QueryOutcome::Errored { stage, error }
}

/// Subject line for a query's digest: the user's description, or the
/// described search terms when there is none.
pub fn subject_for(query: &StoredQuery) -> String {
    let description = match query.user_description() {
        Some(description) => description.replace(['\r', '\n'], " "),
        None => describe_search_inline(&query.query_url),
    };

    if description.is_empty() {
        SUBJECT_PREFIX.to_string()
    } else {
        format!("{SUBJECT_PREFIX}: {description}")
    }
}
