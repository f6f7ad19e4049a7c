//! CLI-specific error types and exit code mapping

use lockaudit_core::error::LockauditError;
use lockaudit_scanner::AuditError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The audit finished and reported vulnerabilities.
    #[error("found {0} vulnerabilities")]
    VulnerabilitiesFound(usize),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from lockaudit-core.
    #[error("{0}")]
    Core(#[from] LockauditError),

    /// Audit domain error.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                |
    /// |------|----------------------------------------|
    /// | 0    | Success, no vulnerabilities            |
    /// | 1    | General / command / audit error        |
    /// | 2    | Configuration error                    |
    /// | 4    | Audit found vulnerabilities            |
    /// | 10   | IO error, advisory db not loadable     |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Core(LockauditError::Config(_)) => 2,
            Self::Audit(AuditError::Config { .. }) => 2,
            Self::VulnerabilitiesFound(_) => 4,
            Self::Io(_) | Self::Core(LockauditError::Io(_)) => 10,
            Self::Audit(AuditError::Io { .. } | AuditError::AdvisoryDbLoad { .. }) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) | Self::Audit(_) => 1,
        }
    }
}
