//! Global configuration document
//!
//! Stored in the content repository as JSON:
//!
//! ```json
//! { "partials": [ { "name": "footer", "source": "footer" } ] }
//! ```

use crate::error::{DispatchError, DispatchResult, StoreError};
use crate::partials::PartialSpec;
use crate::store::ContentStore;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Parsed configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Configuration {
    #[serde(default)]
    pub partials: Vec<PartialSpec>,
}

/// Fetch and parse the configuration document at `path`.
///
/// A missing document means "no partials". A document that exists but does
/// not parse is an error; it is never replaced by defaults.
pub async fn load_configuration(
    store: &dyn ContentStore,
    path: &str,
    call_timeout: Duration,
) -> DispatchResult<Configuration> {
    let document = tokio::time::timeout(call_timeout, store.fetch(path))
        .await
        .map_err(|_| StoreError::Timeout(path.to_string()))??;

    let Some(text) = document else {
        warn!(path = %path, "Configuration document not found, using empty configuration");
        return Ok(Configuration::default());
    };

    let configuration: Configuration =
        serde_json::from_str(&text).map_err(|source| DispatchError::Configuration {
            path: path.to_string(),
            source,
        })?;

    info!(
        path = %path,
        partials = configuration.partials.len(),
        "Configuration loaded"
    );

    Ok(configuration)
}
