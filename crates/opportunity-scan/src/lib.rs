//! # Opportunity Scan
//!
//! This crate re-runs saved SAM.gov searches and emails each subscriber the
//! results they have not been sent yet. It owns the incremental pipeline:
//! window rewriting, listing fetch, de-duplication against the delivered set,
//! digest composition, sending, and the set-union commit that records what
//! was delivered.

/// Data model and error types
mod scan_types;
pub use scan_types::*;

/// Date-window rewriting of stored search URLs
mod url_window;
pub use url_window::*;

/// Human-readable descriptions of search URLs
mod query_describer;
pub use query_describer::*;

/// Filtering of already-delivered results
mod dedup;
pub use dedup::*;

/// Digest rendering
mod summary;
pub use summary::*;

/// SAM.gov listing and detail fetching
mod sam_gov_client;
pub use sam_gov_client::*;

/// Stored-query access and delivered-set commits
mod query_store;
pub use query_store::*;

/// In-memory stored-query backend
mod memory_store;
pub use memory_store::*;

/// Notification sending seam
mod email_service;
pub use email_service::*;

/// Per-run orchestration
mod dispatcher;
pub use dispatcher::*;
