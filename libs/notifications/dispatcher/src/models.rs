use serde::{Deserialize, Serialize};

/// Rendered email ready for a provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Email {
    /// Local identifier, used as a fallback message id
    pub id: String,
    /// Recipient email address
    pub to: String,
    /// Email subject
    pub subject: String,
    /// HTML body
    pub body_html: String,
    /// Sender override (defaults to the provider's configured address)
    pub from: Option<String>,
}

impl Email {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body_html: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            to: to.into(),
            subject: subject.into(),
            body_html: body_html.into(),
            from: None,
        }
    }

    /// Use a specific id (the queue message id, for log correlation)
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

/// Result of processing one queue record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub id: String,
    pub failed: bool,
    pub error_detail: Option<String>,
}

impl OutcomeRecord {
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            failed: false,
            error_detail: None,
        }
    }

    pub fn failure(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            failed: true,
            error_detail: Some(detail.into()),
        }
    }
}

/// Partial batch response understood by the queue's redelivery mechanism.
/// Ids not listed are treated as delivered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

impl BatchResponse {
    /// Keep only failed outcomes, in their original order
    pub fn from_outcomes(outcomes: &[OutcomeRecord]) -> Self {
        Self {
            batch_item_failures: outcomes
                .iter()
                .filter(|outcome| outcome.failed)
                .map(|outcome| BatchItemFailure {
                    item_identifier: outcome.id.clone(),
                })
                .collect(),
        }
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect()
    }
}
