use crate::store::DEFAULT_TTL;
use std::time::Duration;

/// Configuration for the platform runtime services
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Base URL of the dispatch layer that starts workflow runs
    pub trigger_base_url: String,
    /// Budget for dispatching a trigger. Keep well below `default_call_timeout`.
    pub trigger_timeout: Duration,
    /// Overall timeout of a synchronous call when the request sets none
    pub default_call_timeout: Duration,
    /// Timeout of outbound HTTP requests when the request sets none
    pub http_timeout: Duration,
    /// Default TTL of data store entries
    pub store_ttl: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            trigger_base_url: "http://127.0.0.1:8080".to_string(),
            trigger_timeout: Duration::from_secs(10),
            default_call_timeout: Duration::from_secs(30),
            http_timeout: Duration::from_secs(30),
            store_ttl: DEFAULT_TTL,
        }
    }
}

impl PlatformConfig {
    /// Defaults overridden by `MEL_*` environment variables.
    ///
    /// Recognised: `MEL_TRIGGER_URL`, `MEL_TRIGGER_TIMEOUT_SECS`,
    /// `MEL_CALL_TIMEOUT_SECS`, `MEL_HTTP_TIMEOUT_SECS`, `MEL_STORE_TTL_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("MEL_TRIGGER_URL") {
            config.trigger_base_url = url.trim_end_matches('/').to_string();
        }
        let seconds = |name: &str, current: Duration| -> Duration {
            match lookup(name) {
                None => current,
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(secs) if secs > 0 => Duration::from_secs(secs),
                    _ => {
                        tracing::warn!(variable = name, value = %raw, "Ignoring invalid duration");
                        current
                    }
                },
            }
        };
        config.trigger_timeout = seconds("MEL_TRIGGER_TIMEOUT_SECS", config.trigger_timeout);
        config.default_call_timeout = seconds("MEL_CALL_TIMEOUT_SECS", config.default_call_timeout);
        config.http_timeout = seconds("MEL_HTTP_TIMEOUT_SECS", config.http_timeout);
        config.store_ttl = seconds("MEL_STORE_TTL_SECS", config.store_ttl);
        config
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_parallel_nodes: usize,
    pub platform: PlatformConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            platform: PlatformConfig::default(),
        }
    }
}
