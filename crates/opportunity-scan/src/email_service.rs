use async_trait::async_trait;
use notification_services::{NotificationError, NotificationService};
use tracing::info;

/// Delivers one finished notification to one recipient.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Send `body` to `to` and return the transport's message id.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String, NotificationError>;
}

#[async_trait]
impl NotificationSender for NotificationService {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String, NotificationError> {
        self.send_text_email(to, subject, body).await
    }
}

/// Sender that only logs, for dry runs.
pub struct LogOnlySender;

#[async_trait]
impl NotificationSender for LogOnlySender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String, NotificationError> {
        info!("📧 [DRY RUN] To: {}", to);
        info!("📧 [DRY RUN] Subject: {}", subject);
        info!("📧 [DRY RUN] Body:\n{}", body);

        Ok(format!("dry-run-{}", body.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_only_sender() {
        let sender: &dyn NotificationSender = &LogOnlySender;
        let id = sender
            .send("jane@agency.gov", "New SAM.gov results", "body")
            .await
            .unwrap();
        assert_eq!(id, "dry-run-4");
    }
}
