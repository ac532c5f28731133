use chrono_tz::Tz;
use opportunity_scan::{DEFAULT_SCAN_PAGE_SIZE, DEFAULT_TIME_ZONE};
use postgres::database::DEFAULT_DATABASE_URL;

/// Default table holding saved queries.
pub const DEFAULT_TABLE: &str = "saved_queries";

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    /// A variable is set to something unusable
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Offending value
        value: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Everything a run needs from its environment.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Postgres connection string
    pub database_url: String,
    /// Saved-query table name
    pub table: String,
    /// Address digests are sent from; unused on dry runs
    pub sender_email: Option<String>,
    /// AWS region override
    pub aws_region: Option<String>,
    /// AWS endpoint override for local development
    pub aws_endpoint: Option<String>,
    /// Base URL for notice details
    pub detail_base_url: Option<String>,
    /// Stored queries read per scan page
    pub scan_page_size: u32,
    /// Zone in which "today" starts for the search window
    pub time_zone: Tz,
    /// Log digests instead of emailing them
    pub dry_run: bool,
}

impl NotifierConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let dry_run = match get("DRY_RUN") {
            None => false,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "DRY_RUN",
                        reason: "expected true or false".to_string(),
                        value,
                    });
                }
            },
        };

        let sender_email = get("SES_SENDER");
        if sender_email.is_none() && !dry_run {
            return Err(ConfigError::Missing("SES_SENDER"));
        }

        let scan_page_size = match get("SCAN_PAGE_SIZE") {
            None => DEFAULT_SCAN_PAGE_SIZE,
            Some(value) => match value.parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SCAN_PAGE_SIZE",
                        reason: "expected a positive integer".to_string(),
                        value,
                    });
                }
            },
        };

        let time_zone = match get("WINDOW_TIME_ZONE") {
            None => DEFAULT_TIME_ZONE,
            Some(value) => value.parse::<Tz>().map_err(|e| ConfigError::Invalid {
                key: "WINDOW_TIME_ZONE",
                reason: e.to_string(),
                value: value.clone(),
            })?,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            table: get("SAVED_QUERIES_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            sender_email,
            aws_region: get("AWS_REGION"),
            aws_endpoint: get("AWS_ENDPOINT"),
            detail_base_url: get("SAM_DETAIL_BASE_URL"),
            scan_page_size,
            time_zone,
            dry_run,
        })
    }
}
