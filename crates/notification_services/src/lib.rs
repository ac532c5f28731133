//! # Notification Services
//!
//! This crate provides the email transport used to deliver saved-query digests.
//! It wraps AWS SES and knows nothing about queries or results: callers hand it
//! a recipient, a subject and a finished plain-text body.

/// Service definitions for sending notification emails.
pub mod service;
/// Types and structures used by the notification services.
pub mod types;

pub use service::NotificationService;
pub use types::{NotificationError, SesSettings};
