use crate::types::*;
use aws_config::BehaviorVersion;
use aws_sdk_ses::Client as SesClient;
use aws_sdk_ses::config::Region;
use aws_sdk_ses::types::{Body, Content, Destination, Message};

/// Notification service for sending plain-text emails through AWS SES.
#[derive(Debug, Clone)]
pub struct NotificationService {
    ses_client: SesClient,
    from_email: String,
}

impl NotificationService {
    /// Creates a new instance of the NotificationService with the SES client initialized.
    pub async fn new(settings: SesSettings) -> Result<Self, NotificationError> {
        if !is_plausible_email(&settings.from_email) {
            return Err(NotificationError::InvalidEmail(settings.from_email));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = settings.region {
            loader = loader.region(Region::new(region));
        }
        // Override endpoint if specified (useful for local development)
        if let Some(endpoint) = settings.endpoint_url.filter(|e| !e.is_empty()) {
            log::info!("📧 Using SES endpoint override {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        Ok(Self {
            ses_client: SesClient::new(&config),
            from_email: settings.from_email,
        })
    }

    /// Address notifications are sent from.
    pub fn from_email(&self) -> &str {
        &self.from_email
    }

    /// Sends a plain-text email and returns the SES message id.
    pub async fn send_text_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
    ) -> Result<String, NotificationError> {
        if !is_plausible_email(to) {
            return Err(NotificationError::InvalidEmail(to.to_string()));
        }
        if text_body.trim().is_empty() {
            return Err(NotificationError::EmptyBody);
        }

        let subject_content = Content::builder()
            .data(subject)
            .charset("UTF-8")
            .build()
            .map_err(|e| {
                log::error!("❌ Failed to build subject content: {}", e);
                NotificationError::SesError(format!("Failed to build subject: {}", e))
            })?;

        let text_content = Content::builder()
            .data(text_body)
            .charset("UTF-8")
            .build()
            .map_err(|e| {
                log::error!("❌ Failed to build text content: {}", e);
                NotificationError::SesError(format!("Failed to build text body: {}", e))
            })?;

        let body = Body::builder().text(text_content).build();

        let message = Message::builder()
            .subject(subject_content)
            .body(body)
            .build();

        let destination = Destination::builder().to_addresses(to.trim()).build();

        log::debug!("📧 Sending email via AWS SES to {}", to);

        let result = self
            .ses_client
            .send_email()
            .source(&self.from_email)
            .destination(destination)
            .message(message)
            .send()
            .await;

        match result {
            Ok(output) => {
                let message_id = output.message_id().to_string();
                log::info!("✅ Email sent to {} (SES Message ID: {})", to, message_id);
                Ok(message_id)
            }
            Err(e) => {
                log::error!("❌ AWS SES error: {:#?}", e);
                let error_msg = if let Some(service_error) = e.as_service_error() {
                    format!("AWS SES service error: {:?}", service_error)
                } else {
                    format!("AWS SES error: {}", e)
                };
                Err(NotificationError::SesError(error_msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(from: &str) -> SesSettings {
        SesSettings {
            from_email: from.to_string(),
            region: Some("us-east-1".to_string()),
            endpoint_url: Some("http://localhost:4566".to_string()),
        }
    }

    #[tokio::test]
    async fn test_rejects_bad_sender() {
        let result = NotificationService::new(settings("not-an-address")).await;
        assert!(matches!(result, Err(NotificationError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn test_rejects_bad_recipient_before_calling_ses() {
        let service = NotificationService::new(settings("alerts@example.com"))
            .await
            .unwrap();
        assert_eq!(service.from_email(), "alerts@example.com");

        let result = service.send_text_email("nobody", "subject", "body").await;
        assert!(matches!(result, Err(NotificationError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn test_rejects_empty_body_before_calling_ses() {
        let service = NotificationService::new(settings("alerts@example.com"))
            .await
            .unwrap();
        let result = service
            .send_text_email("jane@agency.gov", "subject", "  \n")
            .await;
        assert!(matches!(result, Err(NotificationError::EmptyBody)));
    }
}
