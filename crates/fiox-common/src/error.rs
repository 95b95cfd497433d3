//! Error types for fiox.
//!
//! Structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for grouping
//! - Recoverability hints
//!
//! Variants cover terminal conditions only: per-line decode failures and
//! per-field parse substitutions are handled locally by the supervisor and
//! the decoder and never reach this taxonomy. They surface here only once
//! the fault tolerance is exceeded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for fiox operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// CLI and semantic configuration errors.
    Config,
    /// Subprocess and exposition startup errors.
    Startup,
    /// Failures while fio is running.
    Runtime,
    /// Failures while tearing fio down.
    Shutdown,
    /// Plumbing bugs (channels, threads).
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Startup => write!(f, "startup"),
            ErrorCategory::Runtime => write!(f, "runtime"),
            ErrorCategory::Shutdown => write!(f, "shutdown"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

/// Unified error type for fiox.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("schema validation failed: {0}")]
    Schema(String),

    // Startup errors (20-29)
    #[error("failed to start fio ({binary}): {source}")]
    Startup {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start telemetry endpoint: {0}")]
    Telemetry(String),

    // Runtime errors (30-39)
    #[error("fio exited with failure: {status}")]
    SubprocessExit { status: std::process::ExitStatus },

    #[error("failed to wait for fio: {0}")]
    Wait(std::io::Error),

    #[error("hit error {faults} times decoding fio output")]
    ToleranceExceeded { faults: u32 },

    #[error("failed to read fio output: {0}")]
    Stream(std::io::Error),

    // Shutdown errors (40-49)
    #[error("failed to stop fio process {pid}: {message}")]
    Cleanup { pid: i32, message: String },

    // Internal errors (50-59)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the stable error code for this error type.
    ///
    /// Codes are grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Startup errors
    /// - 30-39: Runtime errors
    /// - 40-49: Shutdown errors
    /// - 50-59: Internal errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::Schema(_) => 11,
            Error::Startup { .. } => 20,
            Error::Telemetry(_) => 21,
            Error::SubprocessExit { .. } => 30,
            Error::Wait(_) => 31,
            Error::ToleranceExceeded { .. } => 32,
            Error::Stream(_) => 33,
            Error::Cleanup { .. } => 40,
            Error::Internal(_) => 50,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::Schema(_) => ErrorCategory::Config,

            Error::Startup { .. } | Error::Telemetry(_) => ErrorCategory::Startup,

            Error::SubprocessExit { .. }
            | Error::Wait(_)
            | Error::ToleranceExceeded { .. }
            | Error::Stream(_) => ErrorCategory::Runtime,

            Error::Cleanup { .. } => ErrorCategory::Shutdown,

            Error::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns whether the user can plausibly resolve this error and rerun.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Fix the flags and rerun
            Error::Config(_) => true,
            // Compiled-in defect
            Error::Schema(_) => false,
            // Install fio or fix the path
            Error::Startup { .. } => true,
            // Pick another port or free the bind address
            Error::Telemetry(_) => true,
            // Fix the job file
            Error::SubprocessExit { .. } => true,
            Error::Wait(_) => false,
            // Usually a fio version producing a different terse layout
            Error::ToleranceExceeded { .. } => true,
            Error::Stream(_) => false,
            // The child must be cleaned up manually
            Error::Cleanup { .. } => false,
            Error::Internal(_) => false,
        }
    }
}
