//! Process exit codes and structured error output.
//!
//! Module-level failures are `thiserror` enums living next to the code that
//! raises them ([`StoreError`](crate::store::StoreError),
//! [`HashError`](crate::pool::HashError),
//! [`CoordinatorError`](crate::coordinator::CoordinatorError),
//! [`ConfigError`](crate::config::ConfigError)). The binary collects them
//! into `anyhow::Error` and maps the outcome to an [`ExitCode`] here.

use serde::Serialize;

/// Exit codes for drivededup.
///
/// - 0: Success (completed normally, duplicates found)
/// - 1: General error (unexpected failure)
/// - 2: No duplicates found (completed normally, nothing to report)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// The run completed and found something to report.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// The run completed but found no duplicates.
    NoDuplicates = 2,
    /// The run was cancelled with Ctrl+C.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DD000",
            Self::GeneralError => "DD001",
            Self::NoDuplicates => "DD002",
            Self::Interrupted => "DD130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Build from an error chain and the exit code it maps to.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }

    /// Render as pretty JSON, falling back to the plain message.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|_| format!("[{}] Error: {}", self.code, self.message))
    }
}
