use thiserror::Error;

/// A measurement that could not be taken. Checks turn this into a WARNING.
#[derive(Debug, Error)]
pub enum CheckUnavailable {
    #[error("{tool} is not available: {reason}")]
    ToolMissing { tool: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse {what}: {input:?}")]
    Parse { what: &'static str, input: String },
}

impl CheckUnavailable {
    pub fn read(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn parse(what: &'static str, input: impl Into<String>) -> Self {
        Self::Parse {
            what,
            input: input.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckUnavailable>;
