//! AWS SES (Simple Email Service) provider
//!
//! Sends the rendered HTML body via the SES v2 `SendEmail` API.
//!
//! Credentials come from the standard AWS SDK chain (environment, web
//! identity, instance/function role). `AWS_SES_REGION` overrides the region
//! used for SES only.

use crate::models::Email;
use crate::provider::{EmailProvider, SendResult};
use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client;
use eyre::{eyre, Result};
use tracing::{debug, error};

/// AWS SES email provider
pub struct SesProvider {
    client: Client,
    from: String,
}

impl SesProvider {
    /// Create a provider around an existing SES client.
    /// `from` is a bare address or `Name <address>`.
    pub fn new(client: Client, from: impl Into<String>) -> Self {
        Self {
            client,
            from: from.into(),
        }
    }

    /// Build a client from the default AWS SDK config
    pub async fn from_env(from: impl Into<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Ok(region) = std::env::var("AWS_SES_REGION") {
            loader = loader.region(aws_config::Region::new(region));
        }

        let config = loader.load().await;
        Self::new(Client::new(&config), from)
    }

    fn utf8(data: &str) -> Result<Content> {
        Content::builder()
            .data(data)
            .charset("UTF-8")
            .build()
            .map_err(|e| eyre!("invalid SES content: {}", e))
    }
}

#[async_trait]
impl EmailProvider for SesProvider {
    async fn send(&self, email: &Email) -> Result<SendResult> {
        let destination = Destination::builder().to_addresses(&email.to).build();

        let message = Message::builder()
            .subject(Self::utf8(&email.subject)?)
            .body(Body::builder().html(Self::utf8(&email.body_html)?).build())
            .build();

        let content = EmailContent::builder().simple(message).build();
        let from = email.from.as_deref().unwrap_or(&self.from);

        debug!(
            email_id = %email.id,
            to = %email.to,
            subject = %email.subject,
            from = %from,
            "Sending email via AWS SES"
        );

        let response = self
            .client
            .send_email()
            .from_email_address(from)
            .destination(destination)
            .content(content)
            .send()
            .await
            .map_err(|e| {
                error!(email_id = %email.id, error = %e, "AWS SES send failed");

                let err_str = e.to_string();
                if err_str.contains("Throttling") || err_str.contains("rate") {
                    eyre!("rate limit exceeded: {}", e)
                } else if err_str.contains("AccessDenied") || err_str.contains("credentials") {
                    eyre!("authentication failed: {}", e)
                } else if err_str.contains("MessageRejected") || err_str.contains("BadRequest") {
                    eyre!("invalid request: {}", e)
                } else {
                    eyre!("SES error: {}", e)
                }
            })?;

        let message_id = response.message_id().unwrap_or(&email.id).to_string();
        debug!(message_id = %message_id, "Email accepted by AWS SES");

        Ok(SendResult { message_id })
    }

    fn name(&self) -> &'static str {
        "aws-ses"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_content() {
        let content = SesProvider::utf8("<p>Hello</p>").unwrap();
        assert_eq!(content.data(), "<p>Hello</p>");
        assert_eq!(content.charset(), Some("UTF-8"));
    }

    #[tokio::test]
    async fn test_provider_name() {
        let config = aws_sdk_sesv2::Config::builder()
            .behavior_version(aws_sdk_sesv2::config::BehaviorVersion::latest())
            .region(aws_sdk_sesv2::config::Region::new("eu-west-1"))
            .build();
        let provider = SesProvider::new(Client::from_conf(config), "noreply@acme.test");

        assert_eq!(provider.name(), "aws-ses");
        assert_eq!(provider.from, "noreply@acme.test");
    }
}
