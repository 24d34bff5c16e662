//! Error types for ka-progress.
//!
//! Library crates use [`KaProgressError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Traversal outcomes have their own small enums ([`VisitFailure`],
//! [`CourseFailure`]) because they are recovered, not propagated: a failed
//! unit is skipped by the course loop, a failed course by the driver.

use std::path::PathBuf;

/// Top-level error type for ka-progress operations.
#[derive(Debug, thiserror::Error)]
pub enum KaProgressError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Missing or empty login credentials. Fatal: nothing can run without a session.
    #[error("credentials error: {message}")]
    Credentials { message: String },

    /// Browser launch, CDP, or login error.
    #[error("browser error: {0}")]
    Browser(String),

    /// Structured data parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad slug, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KaProgressError>;

impl KaProgressError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a credentials error from any displayable message.
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors reported by a navigable page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    /// Navigation did not settle before its deadline.
    #[error("navigation timed out")]
    Timeout,

    /// Any other browser or navigation fault.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A response body could not be read back from the browser.
    #[error("response body unavailable: {0}")]
    Body(String),
}

/// Why a single unit visit produced no snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VisitFailure {
    #[error("timed out loading unit")]
    Timeout,

    #[error("navigation error: {0}")]
    Navigation(String),

    /// The page loaded but the progress endpoint never produced usable data.
    #[error("no progress data captured")]
    NoData,
}

impl From<PageError> for VisitFailure {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Timeout => Self::Timeout,
            other => Self::Navigation(other.to_string()),
        }
    }
}

/// Why a course traversal produced no report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CourseFailure {
    #[error("timed out loading course")]
    Timeout,

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("course title not found")]
    CourseNotFound,

    #[error("no units found")]
    NoUnitsFound,
}

impl From<PageError> for CourseFailure {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Timeout => Self::Timeout,
            other => Self::Navigation(other.to_string()),
        }
    }
}
