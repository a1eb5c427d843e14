//! Error types for the dispatcher.
//!
//! Errors are split by how far they are allowed to travel:
//! - [`ItemError`] and [`TemplateError`] stay inside one work item and end up
//!   as a failed outcome record.
//! - [`StoreError`] is contained per item during page template lookups but is
//!   fatal during one-time configuration.
//! - [`DispatchError`] fails the whole invocation; the queue then redelivers
//!   the entire batch.

use thiserror::Error;

/// Result type for invocation-level operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Content store failures. "Not found" is not an error (see `ContentStore::fetch`).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection, TLS or timeout failure
    #[error("content store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Credentials rejected by the store
    #[error("content store denied access to {path} ({status})")]
    Unauthorized { path: String, status: u16 },

    /// Any other non-success status
    #[error("content store returned {status} for {path}: {body}")]
    Status { path: String, status: u16, body: String },

    /// Payload could not be decoded to UTF-8 text
    #[error("content at {path} could not be decoded: {reason}")]
    Decode { path: String, reason: String },

    /// Path or base URL that cannot address a file in the pinned repository
    #[error("invalid content path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The call did not finish within the configured timeout
    #[error("content store timed out fetching {0}")]
    Timeout(String),
}

/// Failures while obtaining or rendering a template.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("template {name} failed to compile: {reason}")]
    Compile { name: String, reason: String },

    #[error("template {name} failed to render: {reason}")]
    Render { name: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-item validation failures. Never attempted remotely.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error("invalid message({id}): {reason}")]
    Malformed { id: String, reason: String },

    #[error("invalid template({id}): {template}")]
    InvalidTemplate { id: String, template: String },

    #[error("invalid recipient({id})")]
    MissingRecipient { id: String },
}

/// Invocation-level failures. These are returned to the queue runtime.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The configuration document exists but is not valid JSON of the expected shape
    #[error("configuration document {path} is malformed: {source}")]
    Configuration {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The store failed while loading configuration or partials
    #[error("content store failure during configuration: {0}")]
    Store(#[from] StoreError),

    /// Settings could not be read from the environment
    #[error(transparent)]
    Settings(#[from] core_config::ConfigError),
}
