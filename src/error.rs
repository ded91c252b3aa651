use std::time::Duration;
use thiserror::Error;

/// Crate-wide error type, covering provider I/O, model I/O, configuration
/// and orchestrator-level invariant violations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing configuration: {field} - {reason}")]
    ConfigurationMissing { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network timeout after {timeout:?}: {message}")]
    NetworkTimeout { timeout: Duration, message: String },

    #[error("Connection refused: {endpoint}")]
    ConnectionRefused { endpoint: String },

    #[error("DNS resolution failed: {hostname}")]
    DnsFailure { hostname: String },

    #[error("Rate limit exceeded: retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Service temporarily unavailable: {service} - {reason}")]
    ServiceUnavailable { service: String, reason: String },

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Service overloaded: {service}")]
    ServiceOverloaded { service: String },

    #[error("Circuit breaker open for service: {service}")]
    CircuitBreakerOpen { service: String },

    #[error("Circuit breaker half-open, limited requests allowed")]
    CircuitBreakerHalfOpen,

    #[error("Timeout error: operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// A provider call failed for one strategy; never propagated past the
    /// adapter boundary, always converted into an empty result plus this
    /// error recorded against the strategy.
    #[error("Provider '{provider}' strategy '{strategy}' failed: {cause}")]
    ProviderFailed {
        provider: String,
        strategy: String,
        cause: String,
    },

    /// The language model's response could not be parsed as the expected
    /// JSON verdict after every defensive-parsing tier was tried.
    #[error("Model returned malformed response: {0}")]
    ModelMalformedResponse(String),

    /// An internal consistency check failed (e.g. `analyzed != kept +
    /// filtered`). Always a bug in the orchestrator, never in provider or
    /// model I/O; surfaces the run as FAILED.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

/// Error categorization for retry strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Permanent errors - should not retry
    Permanent,
    /// Transient errors - safe to retry
    Transient,
    /// Rate limited - retry with backoff
    RateLimited,
    /// Circuit breaker triggered - stop retrying temporarily
    CircuitBreaker,
}

impl Error {
    /// Categorize error for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_)
            | Error::ConfigurationMissing { .. }
            | Error::InvalidInput { .. }
            | Error::AuthenticationFailed(_)
            | Error::Parse { .. }
            | Error::ModelMalformedResponse(_)
            | Error::InvariantViolation(_)
            | Error::Serde(_) => ErrorCategory::Permanent,

            Error::RateLimitExceeded { .. } => ErrorCategory::RateLimited,

            Error::CircuitBreakerOpen { .. } | Error::CircuitBreakerHalfOpen => {
                ErrorCategory::CircuitBreaker
            }

            Error::Http(_)
            | Error::NetworkTimeout { .. }
            | Error::ConnectionRefused { .. }
            | Error::DnsFailure { .. }
            | Error::ServiceUnavailable { .. }
            | Error::InternalServerError(_)
            | Error::ServiceOverloaded { .. }
            | Error::Timeout { .. }
            | Error::Io(_) => ErrorCategory::Transient,

            Error::ProviderFailed { .. } | Error::Provider(_) => ErrorCategory::Transient,
        }
    }

    /// Check if error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::RateLimited
        )
    }

    /// Get suggested retry delay for rate limited errors.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Check if error indicates a need for circuit breaker.
    #[must_use]
    pub fn should_trigger_circuit_breaker(&self) -> bool {
        matches!(
            self,
            Error::ServiceUnavailable { .. }
                | Error::InternalServerError(_)
                | Error::ServiceOverloaded { .. }
                | Error::NetworkTimeout { .. }
                | Error::ConnectionRefused { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
