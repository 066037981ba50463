//! Error taxonomy shared by the scanner, classifier, template engine and
//! golden verifier.
//!
//! Root-level structural failures (a bad scan root, a template that references
//! data the release does not carry) are surfaced to the caller. Per-file scan
//! failures never show up here; they are recorded as omissions on the
//! [`ScanReport`](crate::scan::ScanReport).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Overall pipeline deadline exceeded. Partial results are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {}ms", .budget.as_millis())]
pub struct TimeoutError {
    pub budget: Duration,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan root does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied reading scan root: {}", .path.display())]
    PermissionDenied { path: PathBuf },

    #[error("scan root is not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("failed to read scan root {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan worker panicked: {0}")]
    WorkerPanicked(String),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl ScanError {
    pub(crate) fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ScanError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied { path },
            std::io::ErrorKind::NotADirectory => ScanError::NotADirectory { path },
            _ => ScanError::Io { path, source: err },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("template '{template}' references field '{field}' which the release metadata does not provide")]
    MissingField { template: String, field: String },

    #[error("release metadata supplies field '{field}' which template '{template}' never references")]
    UnknownField { template: String, field: String },

    #[error("invalid template '{template}': {message}")]
    InvalidTemplate { template: String, message: String },

    #[error("invalid release metadata: {0}")]
    InvalidMetadata(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry: {0}")]
    Parse(String),

    #[error("content rule '{id}' has an invalid pattern: {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },

    #[error("buildpack '{0}' is registered more than once")]
    DuplicateBuildpack(String),
}

#[derive(Debug, Error)]
pub enum GoldenError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fixture '{fixture}' cannot {action} while {state}")]
    InvalidTransition {
        fixture: String,
        action: &'static str,
        state: String,
    },
}

/// Errors from the combined scan → classify and render pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl PipelineError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PipelineError::Timeout(_) | PipelineError::Scan(ScanError::Timeout(_))
        )
    }
}
