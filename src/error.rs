use crate::suggest::SuggestionFailure;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for snippet creation.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Neither an argument nor the clipboard supplied any text.
    #[error("No snippet content: {reason}")]
    ContentMissing {
        /// Why no content could be obtained
        reason: String,
    },

    /// The suggestion service could not produce usable metadata.
    #[error("AI suggestion failed: {0}")]
    Suggestion(SuggestionFailure),

    /// The snippets root or a collection folder is missing or unusable.
    #[error("Cannot access snippets folder '{path}': {message}")]
    FolderAccess {
        /// Folder that could not be used
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The batch file is not valid JSON or lacks the `snippets` array.
    #[error("Malformed batch file '{path}': {message}")]
    MalformedBatch {
        /// Batch file path
        path: PathBuf,
        /// What is wrong with it
        message: String,
    },

    /// Writing a snippet file failed.
    #[error("Failed to write snippet '{path}': {message}")]
    Write {
        /// Target path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// A snippet field failed validation.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Field name
        field: String,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Interactive terminal input failed.
    #[error("Prompt failed: {message}")]
    Prompt {
        /// Error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a content-missing error.
    #[must_use]
    pub fn content_missing(reason: impl Into<String>) -> Self {
        Self::ContentMissing {
            reason: reason.into(),
        }
    }

    /// Creates a folder access error.
    #[must_use]
    pub fn folder(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FolderAccess {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed batch input error.
    #[must_use]
    pub fn malformed_batch(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MalformedBatch {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a write failure for the given target path.
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a validation error for a named field.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a prompt error.
    #[must_use]
    pub fn prompt(message: impl Into<String>) -> Self {
        Self::Prompt {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if the suggestion service failed.
    #[must_use]
    pub const fn is_suggestion(&self) -> bool {
        matches!(self, Self::Suggestion(_))
    }

    /// Returns true if the snippets folder could not be used.
    #[must_use]
    pub const fn is_folder_access(&self) -> bool {
        matches!(self, Self::FolderAccess { .. })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<SuggestionFailure> for Error {
    fn from(e: SuggestionFailure) -> Self {
        Self::Suggestion(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<dialoguer::Error> for Error {
    fn from(e: dialoguer::Error) -> Self {
        Self::prompt(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_folder_error_names_path() {
        let err = Error::folder("/tmp/snippets", "does not exist");
        assert!(err.is_folder_access());
        assert!(err.to_string().contains("/tmp/snippets"));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_write_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::write("/tmp/Git/git_log.json", io_err);
        assert!(err.to_string().contains("git_log.json"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_suggestion_conversion() {
        let err: Error = SuggestionFailure::Disabled.into();
        assert!(err.is_suggestion());
        assert!(err.to_string().starts_with("AI suggestion failed"));
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::validation("keyword", "must not be empty");
        let cloned = err.clone();
        assert!(cloned.is_validation());
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
