//! Mock email provider for testing

use super::{EmailProvider, SendResult};
use crate::models::Email;
use async_trait::async_trait;
use eyre::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mock email provider that captures sent emails.
///
/// Clones share the captured list, so a test can keep one handle while the
/// dispatcher owns another.
#[derive(Clone, Default)]
pub struct MockProvider {
    sent_emails: Arc<Mutex<Vec<Email>>>,
    failing_recipients: Arc<HashSet<String>>,
    failure_message: Option<String>,
}

impl MockProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock provider that always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Fail only for the given recipients
    pub fn failing_for<I, S>(recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing_recipients: Arc::new(recipients.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Get all sent emails
    pub async fn sent_emails(&self) -> Vec<Email> {
        self.sent_emails.lock().await.clone()
    }

    /// Get the count of sent emails
    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    /// Check if an email was sent to a specific address
    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent_emails
            .lock()
            .await
            .iter()
            .any(|e| e.to == address)
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    async fn send(&self, email: &Email) -> Result<SendResult> {
        if let Some(message) = &self.failure_message {
            return Err(eyre::eyre!(message.clone()));
        }
        if self.failing_recipients.contains(&email.to) {
            return Err(eyre::eyre!("mailbox unavailable: {}", email.to));
        }

        self.sent_emails.lock().await.push(email.clone());

        Ok(SendResult {
            message_id: format!("mock-{}", email.id),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_sends_email() {
        let provider = MockProvider::new();
        let email = Email::new("test@example.com", "Test Subject", "<p>body</p>").with_id("m-1");

        let result = provider.send(&email).await.unwrap();
        assert_eq!(result.message_id, "mock-m-1");

        let sent = provider.sent_emails().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "test@example.com");
        assert!(provider.was_sent_to("test@example.com").await);
        assert!(!provider.was_sent_to("other@example.com").await);
    }

    #[tokio::test]
    async fn test_mock_provider_fails() {
        let provider = MockProvider::failing("Simulated failure");
        let email = Email::new("test@example.com", "Test", "<p/>");

        let err = provider.send(&email).await.unwrap_err();
        assert!(err.to_string().contains("Simulated failure"));
        assert_eq!(provider.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_mock_provider_fails_for_selected_recipients() {
        let provider = MockProvider::failing_for(["bounce@example.com"]);

        assert!(provider
            .send(&Email::new("bounce@example.com", "s", "b"))
            .await
            .is_err());
        assert!(provider
            .send(&Email::new("ok@example.com", "s", "b"))
            .await
            .is_ok());
        assert_eq!(provider.sent_count().await, 1);
    }
}
