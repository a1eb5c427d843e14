//! Email provider implementations

pub mod mock;
pub mod ses;

pub use mock::MockProvider;
pub use ses::SesProvider;

use crate::models::Email;
use async_trait::async_trait;
use eyre::Result;

/// Result of sending an email
#[derive(Debug, Clone)]
pub struct SendResult {
    /// Provider-specific message ID
    pub message_id: String,
}

/// Trait for email providers
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email
    async fn send(&self, email: &Email) -> Result<SendResult>;

    /// Get provider name
    fn name(&self) -> &'static str;
}
