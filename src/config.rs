//! Configuration Module
//!
//! Invoker configuration with YAML file loading, human-friendly duration
//! strings ("30s", "5m") and validation. Defaults are carried as named
//! constants so the zero-config path is well defined.

use crate::cache_gate::CachePolicy;
use crate::timeout::TimeoutPolicy;
use crate::worker::RefreshWorkerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_SERVER_CALL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CLIENT_CALL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_EXPENSIVE_CALL_THRESHOLD_SECS: u64 = 5;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_WORKER_REFRESH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_WORKER_KEEPALIVE_WINDOW_SECS: u64 = 120;
pub const DEFAULT_WORKER_MAX_CONCURRENT: usize = 3;

/// Custom deserializer for Duration from string format like "500ms", "30s", "5m"
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let num_end = s
            .char_indices()
            .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .ok_or_else(|| format!("no number found in duration string: {}", s))?;

        let value: f64 = s[..num_end]
            .parse()
            .map_err(|e| format!("failed to parse number '{}': {}", &s[..num_end], e))?;

        match s[num_end..].trim() {
            "ms" => Ok(Duration::from_secs_f64(value / 1000.0)),
            "" | "s" | "sec" | "secs" => Ok(Duration::from_secs_f64(value)),
            "m" | "min" | "mins" => Ok(Duration::from_secs_f64(value * 60.0)),
            "h" | "hr" | "hrs" => Ok(Duration::from_secs_f64(value * 3600.0)),
            unit => Err(format!("unknown duration unit: {}", unit)),
        }
    }
}

/// Background refresh worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(
        default = "default_worker_refresh_interval",
        deserialize_with = "duration_serde::deserialize"
    )]
    pub refresh_interval: Duration,
    #[serde(
        default = "default_worker_keepalive_window",
        deserialize_with = "duration_serde::deserialize"
    )]
    pub keepalive_window: Duration,
    #[serde(default = "default_worker_max_concurrent")]
    pub max_concurrent_refreshes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_worker_refresh_interval(),
            keepalive_window: default_worker_keepalive_window(),
            max_concurrent_refreshes: DEFAULT_WORKER_MAX_CONCURRENT,
        }
    }
}

/// Top-level configuration of the invocation core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Application name stamped on every outbound request.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Application path stamped on every outbound request.
    #[serde(default = "default_app_path")]
    pub app_path: String,
    /// Whether responses participate in caching at all.
    #[serde(default = "default_true")]
    pub enable_cache: bool,
    /// The "surface raw errors" flag: when off, non-business errors without
    /// a configured message are swallowed.
    #[serde(default = "default_true")]
    pub throw_error: bool,
    /// Wait bound for calls forwarded by a server.
    #[serde(
        default = "default_server_call_timeout",
        deserialize_with = "duration_serde::deserialize"
    )]
    pub server_call_timeout: Duration,
    /// Wait bound for direct client calls.
    #[serde(
        default = "default_client_call_timeout",
        deserialize_with = "duration_serde::deserialize"
    )]
    pub client_call_timeout: Duration,
    /// Executions slower than this are cached and kept warm.
    #[serde(
        default = "default_expensive_call_threshold",
        deserialize_with = "duration_serde::deserialize"
    )]
    pub expensive_call_threshold: Duration,
    /// Cache expiry when the request carries no per-method hint.
    #[serde(
        default = "default_cache_ttl",
        deserialize_with = "duration_serde::deserialize"
    )]
    pub cache_ttl: Duration,
    #[serde(default)]
    pub worker: WorkerConfig,
}

fn default_app_name() -> String {
    "rpc-coalesce".to_string()
}

fn default_app_path() -> String {
    std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "/".to_string())
}

fn default_true() -> bool {
    true
}

fn default_server_call_timeout() -> Duration {
    Duration::from_secs(DEFAULT_SERVER_CALL_TIMEOUT_SECS)
}

fn default_client_call_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CLIENT_CALL_TIMEOUT_SECS)
}

fn default_expensive_call_threshold() -> Duration {
    Duration::from_secs(DEFAULT_EXPENSIVE_CALL_THRESHOLD_SECS)
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(DEFAULT_CACHE_TTL_SECS)
}

fn default_worker_refresh_interval() -> Duration {
    Duration::from_secs(DEFAULT_WORKER_REFRESH_INTERVAL_SECS)
}

fn default_worker_keepalive_window() -> Duration {
    Duration::from_secs(DEFAULT_WORKER_KEEPALIVE_WINDOW_SECS)
}

fn default_worker_max_concurrent() -> usize {
    DEFAULT_WORKER_MAX_CONCURRENT
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            app_path: default_app_path(),
            enable_cache: true,
            throw_error: true,
            server_call_timeout: default_server_call_timeout(),
            client_call_timeout: default_client_call_timeout(),
            expensive_call_threshold: default_expensive_call_threshold(),
            cache_ttl: default_cache_ttl(),
            worker: WorkerConfig::default(),
        }
    }
}

impl InvokerConfig {
    /// Load configuration from a YAML file, falling back to defaults for
    /// absent keys.
    pub fn load_from_file(path: &Path) -> std::result::Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file {}: {}", path.display(), e))?;
        let config: Self = serde_yaml::from_str(&text)
            .map_err(|e| format!("failed to parse config file {}: {}", path.display(), e))?;
        config.validate()?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.app_name.is_empty() {
            return Err("app_name cannot be empty".to_string());
        }
        if self.server_call_timeout.is_zero() {
            return Err("server_call_timeout must be greater than zero".to_string());
        }
        if self.client_call_timeout.is_zero() {
            return Err("client_call_timeout must be greater than zero".to_string());
        }
        if self.cache_ttl.is_zero() {
            return Err("cache_ttl must be greater than zero".to_string());
        }
        if self.expensive_call_threshold >= self.cache_ttl {
            return Err(format!(
                "expensive_call_threshold ({:?}) must be below cache_ttl ({:?})",
                self.expensive_call_threshold, self.cache_ttl
            ));
        }
        if self.worker.max_concurrent_refreshes == 0 {
            return Err("worker.max_concurrent_refreshes must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy::new(self.server_call_timeout, self.client_call_timeout)
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            expensive_call_threshold: self.expensive_call_threshold,
            default_ttl: self.cache_ttl,
        }
    }

    pub fn worker_config(&self) -> RefreshWorkerConfig {
        RefreshWorkerConfig {
            refresh_interval: self.worker.refresh_interval,
            keepalive_window: self.worker.keepalive_window,
            max_concurrent_refreshes: self.worker.max_concurrent_refreshes,
            default_ttl: self.cache_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = InvokerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.server_call_timeout,
            Duration::from_secs(DEFAULT_SERVER_CALL_TIMEOUT_SECS)
        );
        assert!(config.enable_cache);
        assert!(config.throw_error);
    }

    #[test]
    fn test_parse_duration_units() {
        use duration_serde::parse_duration;
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("10parsecs").is_err());
    }

    #[test]
    fn test_yaml_round_trip_with_duration_strings() {
        let yaml = r#"
app_name: shop
throw_error: false
client_call_timeout: 90s
expensive_call_threshold: 500ms
worker:
  refresh_interval: 10s
"#;
        let config: InvokerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.app_name, "shop");
        assert!(!config.throw_error);
        assert_eq!(config.client_call_timeout, Duration::from_secs(90));
        assert_eq!(
            config.expensive_call_threshold,
            Duration::from_millis(500)
        );
        assert_eq!(config.worker.refresh_interval, Duration::from_secs(10));
        // Untouched keys keep their defaults.
        assert_eq!(
            config.server_call_timeout,
            Duration::from_secs(DEFAULT_SERVER_CALL_TIMEOUT_SECS)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_timeouts() {
        let config = InvokerConfig {
            client_call_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_threshold_above_ttl() {
        let config = InvokerConfig {
            expensive_call_threshold: Duration::from_secs(120),
            cache_ttl: Duration::from_secs(60),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_config_inherits_cache_ttl() {
        let config = InvokerConfig {
            cache_ttl: Duration::from_secs(15),
            expensive_call_threshold: Duration::from_secs(1),
            ..Default::default()
        };
        assert_eq!(config.worker_config().default_ttl, Duration::from_secs(15));
    }
}
