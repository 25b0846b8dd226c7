//! Stable error codes rendered at the HTTP boundary.
//!
//! Every [`crate::Error`] maps onto exactly one [`ErrorCode`]. The code carries the
//! wire-level `code` string, the `type` string and a default HTTP status, so the
//! JSON error body stays the same no matter which layer raised the error.
//!
//! | Code                    | Type                  | Status |
//! |-------------------------|-----------------------|--------|
//! | `CONFIG_ERROR`          | `configuration_error` | 500    |
//! | `VALIDATION_ERROR`      | `validation_error`    | 400    |
//! | `TRANSLATION_ERROR`     | `translation_error`   | 400    |
//! | `MODEL_NOT_FOUND`       | `model_not_found`     | 404    |
//! | `AUTH_ERROR`            | `authentication_error`| 401    |
//! | `RATE_LIMIT_ERROR`      | `rate_limit_error`    | 429    |
//! | `TIMEOUT_ERROR`         | `timeout_error`       | 504    |
//! | `UPSTREAM_CLIENT_ERROR` | `upstream_error`      | 502    |
//! | `UPSTREAM_SERVER_ERROR` | `upstream_error`      | 502    |
//! | `UPSTREAM_ERROR`        | `upstream_error`      | 502    |
//! | `NETWORK_ERROR`         | `network_error`       | 502    |
//! | `CIRCUIT_OPEN`          | `network_error`       | 503    |
//! | `STREAMING_ERROR`       | `streaming_error`     | 502    |
//! | `UNSUPPORTED_OPERATION` | `unsupported_operation` | 501  |
//! | `INTERNAL_ERROR`        | `internal_error`      | 500    |
//!
//! ## Example
//!
//! ```rust
//! use ollama_openai_gateway::error_code::ErrorCode;
//!
//! let code = ErrorCode::from_http_status(503);
//! assert_eq!(code.code(), "UPSTREAM_SERVER_ERROR");
//! assert_eq!(code.kind(), "upstream_error");
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Configuration,
    Validation,
    Translation,
    ModelNotFound,
    Authentication,
    RateLimited,
    Timeout,
    UpstreamClient,
    UpstreamServer,
    Upstream,
    Network,
    CircuitOpen,
    Streaming,
    UnsupportedOperation,
    Internal,
}

impl ErrorCode {
    /// Wire-level `code` field, e.g. `"VALIDATION_ERROR"`.
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration => "CONFIG_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Translation => "TRANSLATION_ERROR",
            Self::ModelNotFound => "MODEL_NOT_FOUND",
            Self::Authentication => "AUTH_ERROR",
            Self::RateLimited => "RATE_LIMIT_ERROR",
            Self::Timeout => "TIMEOUT_ERROR",
            Self::UpstreamClient => "UPSTREAM_CLIENT_ERROR",
            Self::UpstreamServer => "UPSTREAM_SERVER_ERROR",
            Self::Upstream => "UPSTREAM_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::Streaming => "STREAMING_ERROR",
            Self::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Wire-level `type` field, e.g. `"validation_error"`.
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration_error",
            Self::Validation => "validation_error",
            Self::Translation => "translation_error",
            Self::ModelNotFound => "model_not_found",
            Self::Authentication => "authentication_error",
            Self::RateLimited => "rate_limit_error",
            Self::Timeout => "timeout_error",
            Self::UpstreamClient | Self::UpstreamServer | Self::Upstream => "upstream_error",
            Self::Network | Self::CircuitOpen => "network_error",
            Self::Streaming => "streaming_error",
            Self::UnsupportedOperation => "unsupported_operation",
            Self::Internal => "internal_error",
        }
    }

    /// Default HTTP status used when the error itself carries none.
    #[inline]
    pub fn default_status(&self) -> u16 {
        match self {
            Self::Configuration | Self::Internal => 500,
            Self::Validation | Self::Translation => 400,
            Self::ModelNotFound => 404,
            Self::Authentication => 401,
            Self::RateLimited => 429,
            Self::Timeout => 504,
            Self::UpstreamClient
            | Self::UpstreamServer
            | Self::Upstream
            | Self::Network
            | Self::Streaming => 502,
            Self::CircuitOpen => 503,
            Self::UnsupportedOperation => 501,
        }
    }

    /// Whether a failure of this class is worth another attempt.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::UpstreamServer | Self::Network
        )
    }

    /// Classifies an upstream HTTP status.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 | 403 => Self::Authentication,
            404 => Self::ModelNotFound,
            408 | 504 => Self::Timeout,
            429 => Self::RateLimited,
            400..=499 => Self::UpstreamClient,
            500..=599 => Self::UpstreamServer,
            _ => Self::Upstream,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
