//! Unified error types for the calculation service.

use thiserror::Error;

/// Unified error type for startup and process-level failures.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Flag evaluator could not be created.
    #[error("flag error: {0}")]
    Flag(#[from] FlagError),

    /// Metrics recorder could not be installed.
    #[error("metrics error: {0}")]
    Metrics(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Feature flag provider errors.
///
/// These never reach a request handler: the evaluator logs them and falls
/// back to the caller's default.
#[derive(Error, Debug)]
pub enum FlagError {
    /// No SDK key configured, remote calls are never attempted.
    #[error("flag provider not configured")]
    NotConfigured,

    /// Transport-level failure.
    #[error("flag service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The flag service answered with a non-success status.
    #[error("flag service returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The SDK key was rejected.
    #[error("flag service rejected the SDK key")]
    Unauthorized,

    /// The response body could not be decoded.
    #[error("failed to decode flag service response: {0}")]
    Decode(String),

    /// A concurrent initialization attempt this call waited on failed.
    #[error("flag provider initialization failed")]
    InitializationFailed,

    /// The provider has been closed.
    #[error("flag provider is closed")]
    Closed,
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
