/// Errors raised while handing a notification to the mail transport.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Simple email service (SES) errors.
    #[error("AWS SES error: {0}")]
    SesError(String),

    /// Invalid email format.
    #[error("Invalid email format: {0:?}")]
    InvalidEmail(String),

    /// The message had nothing to say.
    #[error("Refusing to send an empty notification body")]
    EmptyBody,
}

/// Connection settings for the SES client.
#[derive(Debug, Clone, Default)]
pub struct SesSettings {
    /// Address every notification is sent from.
    pub from_email: String,
    /// Region override; the default provider chain is used when absent.
    pub region: Option<String>,
    /// Endpoint override for local development (e.g. localstack).
    pub endpoint_url: Option<String>,
}

/// Loose recipient check: one `@` with text on both sides and a dot in the domain.
pub fn is_plausible_email(address: &str) -> bool {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_email() {
        assert!(is_plausible_email("jane@agency.gov"));
        assert!(is_plausible_email("  jane.doe+sam@example.co.uk "));
        assert!(!is_plausible_email("jane"));
        assert!(!is_plausible_email("@agency.gov"));
        assert!(!is_plausible_email("jane@"));
        assert!(!is_plausible_email("jane@localhost"));
        assert!(!is_plausible_email("jane@@agency.gov"));
        assert!(!is_plausible_email("jane@.gov"));
    }
}
