use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Closed taxonomy of abort reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The repository cannot be fetched or read.
    SourceUnavailable,
    /// The scanner crashed or returned malformed output.
    ToolFailure,
    /// A research/fix/review collaborator is unreachable.
    DependencyUnavailable,
    /// A collaborator call exceeded the stage timeout.
    DependencyTimeout,
    /// Branch or pull-request creation failed.
    PublishFailure,
    /// The run was cancelled by the invocation surface.
    Cancelled,
    /// An unanticipated failure outside the declared taxonomy.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::ToolFailure => "tool_failure",
            ErrorKind::DependencyUnavailable => "dependency_unavailable",
            ErrorKind::DependencyTimeout => "dependency_timeout",
            ErrorKind::PublishFailure => "publish_failure",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A stage's decision to halt the pipeline.
///
/// The counterpart to advancing: every stage either returns its typed delta
/// or one of these.
#[derive(Debug, Clone)]
pub struct StageAbort {
    pub kind: ErrorKind,
    pub message: String,
}

impl StageAbort {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Translate a collaborator error into an abort with the stage's
    /// declared kind. Errors already marked internal keep `Internal` so
    /// unanticipated failures stay distinguishable.
    pub fn from_collaborator(declared: ErrorKind, err: &AppError) -> Self {
        let kind = match err {
            AppError::Internal(_) => ErrorKind::Internal,
            _ => declared,
        };
        Self::new(kind, err.to_string())
    }
}

pub type StepResult<T> = std::result::Result<T, StageAbort>;
