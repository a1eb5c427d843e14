//! Queue records and the work items parsed from them.
//!
//! The queue hands over opaque records (`messageId` + serialized `body`).
//! Parsing a body is a validation step: it yields either a [`WorkItem`] or an
//! [`ItemError`], and never panics on untrusted input.

use crate::error::ItemError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One message as delivered by the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    /// Opaque id, unique within a batch; echoed back for failures
    pub message_id: String,

    /// Serialized JSON payload
    #[serde(default)]
    pub body: String,
}

impl QueueRecord {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
        }
    }
}

/// A batch invocation from the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<QueueRecord>,
}

/// Expected body shape. `addresse` is the producer's field name.
#[derive(Debug, Deserialize)]
struct MessageBody {
    template: String,
    #[serde(default)]
    data: Option<Map<String, Value>>,
    subject: String,
    addresse: String,
}

/// A validated email request.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub id: String,
    pub template_name: String,
    pub template_data: Value,
    pub subject: String,
    pub recipient: String,
}

impl WorkItem {
    /// Parse and validate a queue record.
    ///
    /// Template names beginning with `.` or `/`, or containing relative
    /// segments, would escape the template namespace of the content store and
    /// are rejected here, before any fetch.
    pub fn parse(record: &QueueRecord) -> Result<Self, ItemError> {
        let id = record.message_id.clone();

        let body: MessageBody =
            serde_json::from_str(&record.body).map_err(|e| ItemError::Malformed {
                id: id.clone(),
                reason: e.to_string(),
            })?;

        if is_unsafe_name(&body.template) {
            return Err(ItemError::InvalidTemplate {
                id,
                template: body.template,
            });
        }

        let recipient = body.addresse.trim().to_string();
        if recipient.is_empty() {
            return Err(ItemError::MissingRecipient { id });
        }

        Ok(Self {
            id,
            template_name: body.template,
            template_data: Value::Object(body.data.unwrap_or_default()),
            subject: body.subject,
            recipient,
        })
    }
}

/// True for names that must never be turned into a store path: a leading
/// `.` or `/`, or an empty, `.` or `..` segment anywhere in the name.
pub(crate) fn is_unsafe_name(name: &str) -> bool {
    name.starts_with('.')
        || name.starts_with('/')
        || name
            .split('/')
            .any(|segment| matches!(segment, "" | "." | ".."))
}
