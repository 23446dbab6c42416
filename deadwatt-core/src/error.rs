//! Typed error handling for deadwatt.
//!
//! Provides structured errors that library consumers can match on,
//! with full context about what went wrong and where.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for deadwatt operations.
///
/// This provides typed errors that library consumers can match on,
/// unlike opaque `anyhow::Error` types.
#[derive(Error, Debug)]
pub enum DeadwattError {
    /// I/O error when reading/writing files
    #[error("I/O error at {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Syntax error when parsing Python source. Fatal for that file only;
    /// sibling files in a batch continue.
    #[error("Parse error in {path}: {message}")]
    Parse {
        path: PathBuf,
        message: String,
        /// Line number (1-indexed) if available
        line: Option<usize>,
        /// Column number (1-indexed) if available
        column: Option<usize>,
    },

    /// Configuration file errors
    #[error("Config error at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Safe-removal validation failed: the cleaned source no longer parses.
    /// Non-fatal; the original source is left untouched.
    #[error("Removal aborted for {path}: {message}")]
    Removal { path: PathBuf, message: String },

    /// External annotation call failed or timed out. Non-fatal; the
    /// annotation fields stay absent.
    #[error("Annotation error for `{function}`: {message}")]
    Annotation { function: String, message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DeadwattError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a parse error without location info.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a parse error with line/column info.
    pub fn parse_at(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a removal-validation error.
    pub fn removal(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Removal {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an annotation error.
    pub fn annotation(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Annotation {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error (analysis of other files, or
    /// the rest of this file's result, can continue).
    ///
    /// `Parse` is recoverable at the batch level: it aborts one file while
    /// siblings proceed. `Removal` and `Annotation` never invalidate the
    /// already-computed result.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Config { .. } | Self::Removal { .. } | Self::Annotation { .. }
        )
    }

    /// Get the path associated with this error, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::Parse { path, .. } => Some(path),
            Self::Config { path, .. } => Some(path),
            Self::Removal { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Convenience type alias for deadwatt results.
pub type DeadwattResult<T> = Result<T, DeadwattError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> DeadwattResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> DeadwattResult<T> {
        self.map_err(|e| DeadwattError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error() {
        let err = DeadwattError::io(
            PathBuf::from("/test/app.py"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        assert!(matches!(err, DeadwattError::Io { .. }));
        assert_eq!(err.path(), Some(&PathBuf::from("/test/app.py")));
        assert!(err.to_string().contains("/test/app.py"));
    }

    #[test]
    fn test_parse_error_with_location() {
        let err = DeadwattError::parse_at("/src/app.py", "invalid syntax", 10, 5);
        if let DeadwattError::Parse { line, column, .. } = &err {
            assert_eq!(*line, Some(10));
            assert_eq!(*column, Some(5));
        } else {
            panic!("Expected Parse error");
        }
    }

    #[test]
    fn test_is_recoverable() {
        assert!(DeadwattError::parse("/test.py", "error").is_recoverable());
        assert!(DeadwattError::removal("/test.py", "re-parse failed").is_recoverable());
        assert!(DeadwattError::annotation("helper", "timed out").is_recoverable());
        assert!(!DeadwattError::Internal {
            message: "bug".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_io_result_ext() {
        let result: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let deadwatt_result = result.with_path("/missing/app.py");
        assert!(deadwatt_result.is_err());
    }
}
