//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Default engine REST root.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/engine-rest";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// HTTP client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Engine REST root, e.g. `http://localhost:8080/engine-rest`.
    pub base_url: String,
    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `ENGINE_REST_URL` and `ENGINE_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var("ENGINE_REST_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout = match std::env::var("ENGINE_TIMEOUT_MS") {
            Ok(raw) => parse_millis("ENGINE_TIMEOUT_MS", &raw)?,
            Err(_) => DEFAULT_TIMEOUT,
        };

        Ok(Self { base_url, timeout })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Worker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Identity presented to the engine on every lease.
    pub worker_id: String,
    pub client: ClientConfig,
}

impl WorkerConfig {
    pub fn new(worker_id: impl Into<String>, client: ClientConfig) -> Self {
        Self {
            worker_id: worker_id.into(),
            client,
        }
    }

    /// Load from `WORKER_ID` plus the [`ClientConfig::from_env`] variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let worker_id = std::env::var("WORKER_ID").unwrap_or_else(|_| generated_worker_id());
        if worker_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "WORKER_ID".into(),
                message: "must not be blank".into(),
            });
        }

        Ok(Self {
            worker_id,
            client: ClientConfig::from_env()?,
        })
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new(generated_worker_id(), ClientConfig::default())
    }
}

/// Load the comma-separated `WORKER_TOPICS` list the binary subscribes to.
pub fn topics_from_env() -> Result<Vec<String>, ConfigError> {
    parse_topics(std::env::var("WORKER_TOPICS").ok().as_deref())
}

fn parse_topics(raw: Option<&str>) -> Result<Vec<String>, ConfigError> {
    let topics: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if topics.is_empty() {
        return Err(ConfigError::MissingRequired {
            key: "WORKER_TOPICS".into(),
            hint: "export WORKER_TOPICS=invoice,shipping".into(),
        });
    }
    Ok(topics)
}

fn generated_worker_id() -> String {
    format!("worker-{}", uuid::Uuid::new_v4())
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?} is not a millisecond count: {e}"),
        })
}
