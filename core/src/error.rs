//! Error types for envsync

use thiserror::Error;

/// Coarse error category, reported to operators next to the dataset identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ParseError,
    InvalidSelection,
    PersistenceFailure,
    Config,
    InvalidInput,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ParseError => "ParseError",
            ErrorKind::InvalidSelection => "InvalidSelection",
            ErrorKind::PersistenceFailure => "PersistenceFailure",
            ErrorKind::Config => "Config",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::Io => "Io",
        };
        f.write_str(name)
    }
}

/// Main error type for envsync operations
#[derive(Error, Debug)]
pub enum EnvsyncError {
    /// The dataset identity has no backing storage
    #[error("Dataset '{dataset}' not found at {location}")]
    NotFound { dataset: String, location: String },

    /// Stored content is not a well-formed dataset
    #[error("Dataset '{dataset}' could not be parsed: {source}")]
    Parse {
        dataset: String,
        #[source]
        source: serde_json::Error,
    },

    /// Structurally malformed selection
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Backup or save I/O failed
    #[error("Failed to {operation} dataset '{dataset}': {source}")]
    Persistence {
        dataset: String,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EnvsyncError {
    pub fn not_found(dataset: impl Into<String>, location: impl Into<String>) -> Self {
        Self::NotFound {
            dataset: dataset.into(),
            location: location.into(),
        }
    }

    pub fn parse(dataset: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            dataset: dataset.into(),
            source,
        }
    }

    pub fn persistence(
        dataset: impl Into<String>,
        operation: &'static str,
        source: std::io::Error,
    ) -> Self {
        Self::Persistence {
            dataset: dataset.into(),
            operation,
            source,
        }
    }

    pub fn invalid_selection(msg: impl Into<String>) -> Self {
        Self::InvalidSelection(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Parse { .. } | Self::Json(_) => ErrorKind::ParseError,
            Self::InvalidSelection(_) => ErrorKind::InvalidSelection,
            Self::Persistence { .. } => ErrorKind::PersistenceFailure,
            Self::Config(_) | Self::Toml(_) => ErrorKind::Config,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Dataset identity the error refers to, if any
    pub fn dataset(&self) -> Option<&str> {
        match self {
            Self::NotFound { dataset, .. }
            | Self::Parse { dataset, .. }
            | Self::Persistence { dataset, .. } => Some(dataset),
            _ => None,
        }
    }
}

/// Result type alias for envsync operations
pub type Result<T> = std::result::Result<T, EnvsyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_dataset() {
        let err = EnvsyncError::not_found("dev", "/data/dev.json");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.dataset(), Some("dev"));
        assert_eq!(err.to_string(), "Dataset 'dev' not found at /data/dev.json");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = EnvsyncError::persistence("prod", "save", io);
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
        assert_eq!(err.dataset(), Some("prod"));
        assert!(err.to_string().contains("save"));

        let err = EnvsyncError::invalid_input("bad");
        assert_eq!(err.dataset(), None);
        assert_eq!(err.kind().to_string(), "InvalidInput");
    }
}
