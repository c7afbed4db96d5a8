//! Error types for the Turnstile service.

use thiserror::Error;

/// Main error type for Turnstile operations.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;

/// Per-request admission outcomes that reject the request.
///
/// The display strings are sent verbatim to clients as the `error` field.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    /// No transport-level peer address was available. Fails closed.
    #[error("Unable to determine client address.")]
    AddressUndeterminable,

    /// The client exhausted its quota for the current window.
    #[error("Too many requests. Please try again later.")]
    RateLimitExceeded {
        /// Whole seconds until the window resets
        retry_after_secs: u64,
    },
}
