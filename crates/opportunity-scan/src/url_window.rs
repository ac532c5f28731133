use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use url::Url;

use crate::scan_types::ScanError;

/// Lower bound of the provider's modification-date filter.
pub const MODIFIED_FROM: &str = "modified_date.from";
/// Upper bound of the provider's modification-date filter.
pub const MODIFIED_TO: &str = "modified_date.to";
/// Zone the provider's day boundaries are expressed in.
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::US::Eastern;

/// Rewrites a stored search URL so it only asks for notices modified since
/// the start of the current day.
#[derive(Debug, Clone, Copy)]
pub struct UrlWindowRewriter {
    time_zone: Tz,
}

impl Default for UrlWindowRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_ZONE)
    }
}

impl UrlWindowRewriter {
    /// Create a rewriter whose "today" is taken in `time_zone`.
    pub fn new(time_zone: Tz) -> Self {
        Self { time_zone }
    }

    /// The `modified_date.from` value for the day containing `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.time_zone)
            .format("%Y-%m-%d-00:00")
            .to_string()
    }

    /// Rewrite as if the current instant were `now`.
    ///
    /// `modified_date.from` becomes the start of today and `modified_date.to`
    /// is emptied. Both are rewritten where they already sit or appended when
    /// missing; repeats of either key are dropped. Every other pair is kept
    /// byte for byte and in order.
    pub fn rewrite_at(&self, url: &str, now: DateTime<Utc>) -> Result<String, ScanError> {
        let malformed =
            |reason: &dyn std::fmt::Display| ScanError::MalformedQuery(format!("{url}: {reason}"));

        let parsed = Url::parse(url).map_err(|e| malformed(&e))?;
        if parsed.query().is_none_or(str::is_empty) {
            return Err(malformed(&"missing query string"));
        }

        // Work on the text as stored; the parsed form percent-encodes quotes and spaces.
        let (prefix, rest) = url
            .split_once('?')
            .ok_or_else(|| malformed(&"missing query string"))?;
        let (query, fragment) = match rest.split_once('#') {
            Some((query, fragment)) => (query, Some(fragment)),
            None => (rest, None),
        };

        let from = self.window_start(now);
        let mut pairs: Vec<String> = Vec::new();
        let mut saw_from = false;
        let mut saw_to = false;

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let key = pair.split_once('=').map_or(pair, |(key, _)| key);
            match key {
                MODIFIED_FROM => {
                    if !saw_from {
                        pairs.push(format!("{MODIFIED_FROM}={from}"));
                        saw_from = true;
                    }
                }
                MODIFIED_TO => {
                    if !saw_to {
                        pairs.push(format!("{MODIFIED_TO}="));
                        saw_to = true;
                    }
                }
                _ => pairs.push(pair.to_string()),
            }
        }

        if !saw_from {
            pairs.push(format!("{MODIFIED_FROM}={from}"));
        }
        if !saw_to {
            pairs.push(format!("{MODIFIED_TO}="));
        }

        let mut rewritten = format!("{prefix}?{}", pairs.join("&"));
        if let Some(fragment) = fragment {
            rewritten.push('#');
            rewritten.push_str(fragment);
        }
        Ok(rewritten)
    }
}
