use thiserror::Error;

/// Every failure carries the message printed to stderr and the exit code the
/// process terminates with. Scheduling functions never construct one of these;
/// errors exist only at the CLI and storage boundaries.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CliError {
    pub message: String,
    pub exit_code: i32,
}

impl CliError {
    fn with_code(message: impl Into<String>, exit_code: i32) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::with_code(message, 2)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_code(message, 3)
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::with_code(message, 4)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_code(message, 5)
    }
}
