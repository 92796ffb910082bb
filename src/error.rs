//! Error taxonomy for the analysis engine.
//!
//! Strategies only ever raise [`ParseError`]. File access and resource
//! errors are produced by the resilience layer before a strategy runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to obtain readable bytes for a file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileAccessError {
    #[error("file not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("permission denied: {}", .path.display())]
    PermissionDenied { path: PathBuf },
    #[error("cannot read {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error("{} looks like binary content", .path.display())]
    Binary { path: PathBuf },
}

impl FileAccessError {
    /// Classify an I/O error for a path.
    pub fn from_io(path: &Path, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FileAccessError::NotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => FileAccessError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => FileAccessError::Unreadable {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
        }
    }
}

/// A strategy-specific syntax failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{language} syntax error at line {line}: {message}")]
    Syntax {
        language: &'static str,
        line: usize,
        message: String,
    },
    #[error("unterminated {what} starting at line {line}")]
    Unterminated { what: &'static str, line: usize },
    #[error("unbalanced delimiters in {what} starting at line {line}")]
    Unbalanced { what: &'static str, line: usize },
    #[error("grammar setup failed: {0}")]
    Grammar(String),
    #[error("no extraction strategy for extension {extension:?}")]
    UnsupportedLanguage { extension: String },
}

/// A budget violation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceConstraintError {
    #[error("file is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("analysis exceeded {} ms", .limit.as_millis())]
    Timeout { limit: Duration },
    #[error("memory budget exhausted: {requested} bytes requested, {available} bytes available")]
    MemoryPressure { requested: u64, available: u64 },
}

/// Any error the engine can observe while analyzing a file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(transparent)]
    FileAccess(#[from] FileAccessError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    ResourceConstraint(#[from] ResourceConstraintError),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

/// How much a recorded error matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Top-level error family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    FileAccess,
    Parse,
    ResourceConstraint,
    Unexpected,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::FileAccess => "file_access",
            ErrorCategory::Parse => "parse",
            ErrorCategory::ResourceConstraint => "resource_constraint",
            ErrorCategory::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AnalysisError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalysisError::FileAccess(_) => ErrorCategory::FileAccess,
            AnalysisError::Parse(_) => ErrorCategory::Parse,
            AnalysisError::ResourceConstraint(_) => ErrorCategory::ResourceConstraint,
            AnalysisError::Unexpected(_) => ErrorCategory::Unexpected,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AnalysisError::FileAccess(_) => Severity::Low,
            AnalysisError::Parse(ParseError::UnsupportedLanguage { .. }) => Severity::Low,
            AnalysisError::Parse(_) => Severity::Medium,
            AnalysisError::ResourceConstraint(ResourceConstraintError::FileTooLarge { .. }) => {
                Severity::Low
            }
            AnalysisError::ResourceConstraint(_) => Severity::High,
            AnalysisError::Unexpected(_) => Severity::Critical,
        }
    }

    /// Plain-language message for end users.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::FileAccess(FileAccessError::NotFound { .. }) => {
                "The file does not exist.".to_string()
            }
            AnalysisError::FileAccess(FileAccessError::PermissionDenied { .. }) => {
                "The file could not be opened because of its permissions.".to_string()
            }
            AnalysisError::FileAccess(FileAccessError::Unreadable { .. }) => {
                "The file could not be read.".to_string()
            }
            AnalysisError::FileAccess(FileAccessError::Binary { .. }) => {
                "The file looks like binary data and was skipped.".to_string()
            }
            AnalysisError::Parse(ParseError::UnsupportedLanguage { .. }) => {
                "No dedicated analyzer exists for this file type; a generic scan was used."
                    .to_string()
            }
            AnalysisError::Parse(_) => {
                "The file could not be parsed completely; results come from a fallback scan."
                    .to_string()
            }
            AnalysisError::ResourceConstraint(ResourceConstraintError::FileTooLarge {
                ..
            }) => "The file exceeds the configured size limit and was skipped.".to_string(),
            AnalysisError::ResourceConstraint(ResourceConstraintError::Timeout { .. }) => {
                "Analysis took too long; results come from a fallback scan.".to_string()
            }
            AnalysisError::ResourceConstraint(ResourceConstraintError::MemoryPressure {
                ..
            }) => "Too much content is being analyzed at once; the file was skipped.".to_string(),
            AnalysisError::Unexpected(_) => {
                "An internal error occurred while analyzing the file.".to_string()
            }
        }
    }
}

/// A recorded, serializable error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredError {
    pub severity: Severity,
    pub category: ErrorCategory,
    pub message: String,
    pub detail: String,
    pub file: String,
}

impl StructuredError {
    pub fn new(path: &Path, error: &AnalysisError) -> Self {
        Self {
            severity: error.severity(),
            category: error.category(),
            message: error.user_message(),
            detail: error.to_string(),
            file: path.to_string_lossy().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let path = Path::new("missing.py");
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            FileAccessError::from_io(path, &err),
            FileAccessError::NotFound { .. }
        ));

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(
            FileAccessError::from_io(path, &err),
            FileAccessError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn test_severity_policy() {
        let oversized: AnalysisError = ResourceConstraintError::FileTooLarge {
            size: 50,
            limit: 10,
        }
        .into();
        assert_eq!(oversized.severity(), Severity::Low);
        assert_eq!(oversized.category(), ErrorCategory::ResourceConstraint);

        let timeout: AnalysisError = ResourceConstraintError::Timeout {
            limit: Duration::from_millis(5),
        }
        .into();
        assert_eq!(timeout.severity(), Severity::High);

        let parse: AnalysisError = ParseError::Unbalanced {
            what: "function body",
            line: 3,
        }
        .into();
        assert_eq!(parse.severity(), Severity::Medium);
        assert_eq!(parse.category(), ErrorCategory::Parse);

        assert_eq!(
            AnalysisError::Unexpected("boom".to_string()).severity(),
            Severity::Critical
        );
    }

    #[test]
    fn test_structured_error() {
        let err: AnalysisError = FileAccessError::Binary {
            path: PathBuf::from("logo.png"),
        }
        .into();
        let record = StructuredError::new(Path::new("logo.png"), &err);
        assert_eq!(record.category, ErrorCategory::FileAccess);
        assert_eq!(record.severity, Severity::Low);
        assert!(record.detail.contains("binary"));
        assert_eq!(record.file, "logo.png");
    }
}
