//! Process settings, read once from the environment at startup

use core_config::{env_flag, env_optional, env_or_default, env_parse, env_required, ConfigError, FromEnv};
use std::str::FromStr;
use std::time::Duration;

/// How the processor treats the mail transport's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// The send is awaited but its result never changes the item outcome;
    /// failures are only logged
    #[default]
    BestEffort,
    /// A failed or timed-out send fails the item, so the queue redelivers it
    Confirmed,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best_effort" | "best-effort" => Ok(DeliveryMode::BestEffort),
            "confirmed" => Ok(DeliveryMode::Confirmed),
            other => Err(format!(
                "unknown delivery mode '{}', expected 'best_effort' or 'confirmed'",
                other
            )),
        }
    }
}

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Content repository as `owner/repo`
    pub repository: String,
    /// Branch or revision all fetches are pinned to
    pub revision: String,
    /// Content store API base URL
    pub api_url: String,
    /// Optional store token
    pub token: Option<String>,
    /// Path of the configuration document in the store
    pub config_path: String,
    /// Keep compiled page templates for the process lifetime
    pub cache_templates: bool,
    /// Source address for outgoing mail
    pub from_address: String,
    /// Optional display name for the source address
    pub from_name: Option<String>,
    /// Items of one batch processed at the same time
    pub max_concurrency: usize,
    /// Timeout for each store fetch and each send
    pub call_timeout: Duration,
    pub delivery_mode: DeliveryMode,
}

impl DispatcherSettings {
    pub fn new(repository: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            revision: "main".to_string(),
            api_url: "https://api.github.com".to_string(),
            token: None,
            config_path: "config.json".to_string(),
            cache_templates: true,
            from_address: from_address.into(),
            from_name: None,
            max_concurrency: 16,
            call_timeout: Duration::from_secs(10),
            delivery_mode: DeliveryMode::BestEffort,
        }
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_templates = enabled;
        self
    }

    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    pub fn with_max_concurrency(mut self, count: usize) -> Self {
        self.max_concurrency = count.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = path.into();
        self
    }

    /// `Name <address>` when a display name is configured
    pub fn from_header(&self) -> String {
        match &self.from_name {
            Some(name) => format!("{} <{}>", name, self.from_address),
            None => self.from_address.clone(),
        }
    }
}

impl FromEnv for DispatcherSettings {
    /// Required: `CONTENT_REPOSITORY`, `EMAIL_FROM_ADDRESS`.
    /// Everything else has a default.
    fn from_env() -> Result<Self, ConfigError> {
        let repository = env_required("CONTENT_REPOSITORY")?;
        if !repository.contains('/') {
            return Err(ConfigError::ParseError {
                key: "CONTENT_REPOSITORY".to_string(),
                details: format!("expected 'owner/repo', got '{}'", repository),
            });
        }

        let timeout_ms: u64 = env_parse("DISPATCH_CALL_TIMEOUT_MS", 10_000)?;

        Ok(Self {
            repository,
            revision: env_or_default("CONTENT_REVISION", "main"),
            api_url: env_or_default("CONTENT_API_URL", "https://api.github.com"),
            token: env_optional("CONTENT_TOKEN"),
            config_path: env_or_default("CONFIG_PATH", "config.json"),
            cache_templates: !env_flag("DISABLE_TEMPLATE_CACHE", false)?,
            from_address: env_required("EMAIL_FROM_ADDRESS")?,
            from_name: env_optional("EMAIL_FROM_NAME"),
            max_concurrency: env_parse::<usize>("DISPATCH_MAX_CONCURRENCY", 16)?.max(1),
            call_timeout: Duration::from_millis(timeout_ms),
            delivery_mode: env_parse("DISPATCH_DELIVERY_MODE", DeliveryMode::BestEffort)?,
        })
    }
}
