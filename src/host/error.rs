use thiserror::Error;

/// A host scheduler call that did not succeed.
///
/// Holds owned strings only so it can be copied into reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostCallError {
    #[error("`{command}` failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to run `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("`{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("{operation} {path}: {message}")]
    Io {
        operation: &'static str,
        path: String,
        message: String,
    },
}

impl HostCallError {
    /// The command line (or file operation) that failed
    pub fn command(&self) -> String {
        match self {
            Self::Failed { command, .. }
            | Self::Spawn { command, .. }
            | Self::Timeout { command, .. } => command.clone(),
            Self::Io {
                operation, path, ..
            } => format!("{} {}", operation, path),
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    pub fn io(operation: &'static str, path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HostCallError>;
