//! # Postgres
//!
//! This crate provides the connection pool the notifier uses to reach the saved-query table.

/// Database client for the notifier.
pub mod database;
