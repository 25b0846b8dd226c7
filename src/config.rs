//! Process configuration.
//!
//! A [`GatewayConfig`] is built once at startup, either from the environment
//! ([`GatewayConfig::from_env`]) or programmatically with the `with_*` builder
//! methods, and then shared by reference. Reloading means building a new value.
//!
//! | Variable                      | Default  | Meaning                                  |
//! |-------------------------------|----------|------------------------------------------|
//! | `OPENAI_API_BASE_URL`         | required | Upstream base URL, normalized to `/v1`   |
//! | `OPENAI_API_KEY`              | required | Bearer credential forwarded upstream     |
//! | `PROXY_PORT`                  | 11434    | Listen port                              |
//! | `LOG_LEVEL`                   | INFO     | DEBUG, INFO, WARNING, ERROR, CRITICAL    |
//! | `LOG_FORMAT`                  | text     | `text` or `json`                         |
//! | `REQUEST_TIMEOUT`             | 60       | Total per-attempt timeout (seconds)      |
//! | `CONNECT_TIMEOUT`             | 10       | Connect timeout (seconds)                |
//! | `MAX_RETRIES`                 | 3        | Total attempts per upstream call         |
//! | `RETRY_BASE_DELAY_MS`         | 1000     | First backoff delay                      |
//! | `RETRY_MAX_DELAY_MS`          | 60000    | Backoff ceiling                          |
//! | `CIRCUIT_FAILURE_THRESHOLD`   | 5        | Failures before the breaker opens        |
//! | `CIRCUIT_RECOVERY_TIMEOUT`    | 60       | Open period (seconds)                    |
//! | `CIRCUIT_HALF_OPEN_MAX_CALLS` | 3        | Probe successes needed to close          |
//! | `POOL_MAX_IDLE_PER_HOST`      | 20       | Keep-alive connections per host          |
//! | `MODEL_MAPPING_FILE`          | unset    | JSON object of model name overrides      |
//! | `ENABLE_TOOLS`                | true     | Accept tool definitions                  |
//! | `ENABLE_IMAGES`               | true     | Accept image attachments                 |
//! | `SYNTHESIZE_TIMINGS`          | false    | Fill placeholder durations from usage    |

use crate::{Error, ErrorContext, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub port: u16,
    /// Level directive understood by `tracing_subscriber::EnvFilter`.
    pub log_level: String,
    pub log_format: LogFormat,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub circuit_failure_threshold: u32,
    pub circuit_recovery_timeout: Duration,
    pub circuit_half_open_max_calls: u32,
    pub pool_max_idle_per_host: usize,
    pub model_mapping_file: Option<PathBuf>,
    pub enable_tools: bool,
    pub enable_images: bool,
    pub synthesize_timings: bool,
}

impl GatewayConfig {
    /// Creates a config with defaults for everything except the upstream target.
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(config_error("OPENAI_API_KEY", "API key cannot be empty"));
        }
        Ok(Self {
            base_url: normalize_base_url(base_url.as_ref())?,
            api_key,
            port: 11434,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1000),
            retry_max_delay: Duration::from_millis(60_000),
            circuit_failure_threshold: 5,
            circuit_recovery_timeout: Duration::from_secs(60),
            circuit_half_open_max_calls: 3,
            pool_max_idle_per_host: 20,
            model_mapping_file: None,
            enable_tools: true,
            enable_images: true,
            synthesize_timings: false,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = get("OPENAI_API_BASE_URL").ok_or_else(|| {
            config_error("OPENAI_API_BASE_URL", "required environment variable is not set")
        })?;
        let api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            config_error("OPENAI_API_KEY", "required environment variable is not set")
        })?;
        let mut cfg = Self::new(base_url, api_key)?;

        if let Some(v) = get("PROXY_PORT") {
            cfg.port = parse_key("PROXY_PORT", &v)?;
            if cfg.port < 1024 {
                return Err(config_error("PROXY_PORT", "port must be between 1024 and 65535"));
            }
        }
        if let Some(v) = get("LOG_LEVEL") {
            cfg.log_level = parse_log_level(&v)?;
        }
        if let Some(v) = get("LOG_FORMAT") {
            cfg.log_format = v
                .parse()
                .map_err(|e: String| config_error("LOG_FORMAT", e))?;
        }
        if let Some(v) = get("REQUEST_TIMEOUT") {
            cfg.request_timeout = Duration::from_secs(parse_positive("REQUEST_TIMEOUT", &v)?);
        }
        if let Some(v) = get("CONNECT_TIMEOUT") {
            cfg.connect_timeout = Duration::from_secs(parse_positive("CONNECT_TIMEOUT", &v)?);
        }
        if let Some(v) = get("MAX_RETRIES") {
            cfg.max_retries = parse_positive("MAX_RETRIES", &v)? as u32;
        }
        if let Some(v) = get("RETRY_BASE_DELAY_MS") {
            cfg.retry_base_delay = Duration::from_millis(parse_key("RETRY_BASE_DELAY_MS", &v)?);
        }
        if let Some(v) = get("RETRY_MAX_DELAY_MS") {
            cfg.retry_max_delay = Duration::from_millis(parse_key("RETRY_MAX_DELAY_MS", &v)?);
        }
        if cfg.retry_max_delay < cfg.retry_base_delay {
            return Err(config_error(
                "RETRY_MAX_DELAY_MS",
                "must not be smaller than RETRY_BASE_DELAY_MS",
            ));
        }
        if let Some(v) = get("CIRCUIT_FAILURE_THRESHOLD") {
            cfg.circuit_failure_threshold = parse_positive("CIRCUIT_FAILURE_THRESHOLD", &v)? as u32;
        }
        if let Some(v) = get("CIRCUIT_RECOVERY_TIMEOUT") {
            cfg.circuit_recovery_timeout =
                Duration::from_secs(parse_key("CIRCUIT_RECOVERY_TIMEOUT", &v)?);
        }
        if let Some(v) = get("CIRCUIT_HALF_OPEN_MAX_CALLS") {
            cfg.circuit_half_open_max_calls =
                parse_positive("CIRCUIT_HALF_OPEN_MAX_CALLS", &v)? as u32;
        }
        if let Some(v) = get("POOL_MAX_IDLE_PER_HOST") {
            cfg.pool_max_idle_per_host = parse_key("POOL_MAX_IDLE_PER_HOST", &v)?;
        }
        cfg.model_mapping_file = get("MODEL_MAPPING_FILE").map(PathBuf::from);
        if let Some(v) = get("ENABLE_TOOLS") {
            cfg.enable_tools = parse_bool("ENABLE_TOOLS", &v)?;
        }
        if let Some(v) = get("ENABLE_IMAGES") {
            cfg.enable_images = parse_bool("ENABLE_IMAGES", &v)?;
        }
        if let Some(v) = get("SYNTHESIZE_TIMINGS") {
            cfg.synthesize_timings = parse_bool("SYNTHESIZE_TIMINGS", &v)?;
        }
        Ok(cfg)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = attempts.max(1);
        self
    }

    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max.max(base);
        self
    }

    pub fn with_circuit_breaker(
        mut self,
        failure_threshold: u32,
        recovery_timeout: Duration,
        half_open_max_calls: u32,
    ) -> Self {
        self.circuit_failure_threshold = failure_threshold.max(1);
        self.circuit_recovery_timeout = recovery_timeout;
        self.circuit_half_open_max_calls = half_open_max_calls.max(1);
        self
    }

    pub fn with_model_mapping_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_mapping_file = Some(path.into());
        self
    }

    pub fn with_tools_enabled(mut self, enabled: bool) -> Self {
        self.enable_tools = enabled;
        self
    }

    pub fn with_images_enabled(mut self, enabled: bool) -> Self {
        self.enable_images = enabled;
        self
    }

    pub fn with_synthesized_timings(mut self, enabled: bool) -> Self {
        self.synthesize_timings = enabled;
        self
    }

    /// Joins an upstream path (e.g. `/chat/completions`) onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Validates `raw` and ensures it ends with `/v1`.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|e| {
        config_error("OPENAI_API_BASE_URL", format!("invalid URL '{}': {}", trimmed, e))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(config_error(
            "OPENAI_API_BASE_URL",
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    if parsed.host_str().is_none() {
        return Err(config_error("OPENAI_API_BASE_URL", "URL has no host"));
    }
    if trimmed.ends_with("/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}/v1", trimmed))
    }
}

fn config_error(key: &str, msg: impl Into<String>) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(key.to_string())
            .with_source("config"),
    )
}

fn parse_key<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| config_error(key, format!("invalid value '{}': {}", raw, e)))
}

fn parse_positive(key: &str, raw: &str) -> Result<u64> {
    let v: u64 = parse_key(key, raw)?;
    if v == 0 {
        return Err(config_error(key, "value must be greater than zero"));
    }
    Ok(v)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(config_error(key, format!("invalid boolean '{}'", raw))),
    }
}

fn parse_log_level(raw: &str) -> Result<String> {
    let level = match raw.trim().to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => {
            return Err(config_error(
                "LOG_LEVEL",
                format!(
                    "invalid level '{}', expected one of DEBUG, INFO, WARNING, ERROR, CRITICAL",
                    raw
                ),
            ))
        }
    };
    Ok(level.to_string())
}
