//! Exit codes for fiox-core.
//!
//! Stable codes grouped by failure domain:
//! - 0: clean run
//! - 2: usage errors (emitted by the argument parser)
//! - 10-15: operational errors the operator can act on
//! - 20: internal defects
//!
//! Scripts and process supervisors may rely on these values.

use fiox_common::Error;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run finished cleanly: fio completed, or a shutdown signal stopped it.
    Clean = 0,
    /// Flags parsed but failed semantic validation.
    ArgsError = 10,
    /// fio could not be started.
    StartupError = 11,
    /// The telemetry endpoint could not be started.
    TelemetryError = 12,
    /// fio exited with a failure status or could not be reaped.
    FioError = 13,
    /// The decode fault tolerance on fio output was exceeded.
    ToleranceError = 14,
    /// fio could not be stopped during signal shutdown.
    CleanupError = 15,
    /// A defect in fiox itself.
    InternalError = 20,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Errors the operator resolves by fixing flags or the environment.
    pub fn is_user_error(self) -> bool {
        matches!(
            self,
            ExitCode::ArgsError | ExitCode::StartupError | ExitCode::TelemetryError
        )
    }

    pub fn is_internal_error(self) -> bool {
        matches!(self, ExitCode::InternalError)
    }

    /// Map a terminal error to its exit code.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Config(_) => ExitCode::ArgsError,
            // A bad compiled-in schema is a defect, not an operator problem
            Error::Schema(_) => ExitCode::InternalError,
            Error::Startup { .. } => ExitCode::StartupError,
            Error::Telemetry(_) => ExitCode::TelemetryError,
            Error::SubprocessExit { .. } | Error::Wait(_) => ExitCode::FioError,
            Error::ToleranceExceeded { .. } => ExitCode::ToleranceError,
            Error::Stream(_) => ExitCode::InternalError,
            Error::Cleanup { .. } => ExitCode::CleanupError,
            Error::Internal(_) => ExitCode::InternalError,
        }
    }

    /// Stable name for logs and diagnostics.
    pub fn code_name(self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::StartupError => "ERR_STARTUP",
            ExitCode::TelemetryError => "ERR_TELEMETRY",
            ExitCode::FioError => "ERR_FIO_EXIT",
            ExitCode::ToleranceError => "ERR_DECODE_TOLERANCE",
            ExitCode::CleanupError => "ERR_CLEANUP",
            ExitCode::InternalError => "ERR_INTERNAL",
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::StartupError.as_i32(), 11);
        assert_eq!(ExitCode::TelemetryError.as_i32(), 12);
        assert_eq!(ExitCode::FioError.as_i32(), 13);
        assert_eq!(ExitCode::ToleranceError.as_i32(), 14);
        assert_eq!(ExitCode::CleanupError.as_i32(), 15);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
    }

    #[test]
    fn test_predicates() {
        assert!(ExitCode::Clean.is_success());
        assert!(!ExitCode::FioError.is_success());
        assert!(ExitCode::ArgsError.is_user_error());
        assert!(!ExitCode::InternalError.is_user_error());
        assert!(ExitCode::InternalError.is_internal_error());
    }

    #[test]
    fn test_from_error() {
        let err = Error::Config("bad interval".to_string());
        assert_eq!(ExitCode::from_error(&err), ExitCode::ArgsError);

        let err = Error::Startup {
            binary: "fio".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(ExitCode::from_error(&err), ExitCode::StartupError);

        let err = Error::ToleranceExceeded { faults: 4 };
        assert_eq!(ExitCode::from_error(&err), ExitCode::ToleranceError);

        let err = Error::Cleanup {
            pid: 7,
            message: "EPERM".to_string(),
        };
        assert_eq!(ExitCode::from_error(&err), ExitCode::CleanupError);

        let err = Error::Internal("channel closed".to_string());
        assert_eq!(ExitCode::from_error(&err), ExitCode::InternalError);
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::Clean.to_string(), "OK_CLEAN (0)");
        assert_eq!(
            ExitCode::ToleranceError.to_string(),
            "ERR_DECODE_TOLERANCE (14)"
        );
    }

    #[test]
    fn test_into_i32() {
        let code: i32 = ExitCode::FioError.into();
        assert_eq!(code, 13);
    }
}
