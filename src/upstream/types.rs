//! Upstream document service types and error definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur talking to the document service.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Session is not (or no longer) authorized.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Call did not complete in time.
    #[error("upstream timeout after {0} seconds")]
    Timeout(u64),

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected response shape or status.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl UpstreamError {
    /// True when the session must be replaced before further calls can succeed.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, UpstreamError::Unauthorized(_))
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// One entry of a project's revision history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RevisionDescriptor {
    /// Revision number the project has after this update.
    #[serde(rename = "toV")]
    pub to_version: u64,
}

/// Current revision of a project: the newest history entry, or 0 when empty.
pub fn current_revision(history: &[RevisionDescriptor]) -> u64 {
    history.first().map(|d| d.to_version).unwrap_or(0)
}

/// Identifier of a file or document inside a project tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FileId(pub String);

/// Reference to a build output that can be fetched with `fetch_file`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputFileRef {
    pub path: String,
    pub url: String,
}

/// Status reported by the compile endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileStatus {
    Success,
    Failure,
    StoppedOnFirstError,
    CompileInProgress,
    TooRecentlyCompiled,
    TimedOut,
    Terminated,
    Unavailable,
    Other(String),
}

impl CompileStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CompileStatus::Success => "success",
            CompileStatus::Failure => "failure",
            CompileStatus::StoppedOnFirstError => "stopped-on-first-error",
            CompileStatus::CompileInProgress => "compile-in-progress",
            CompileStatus::TooRecentlyCompiled => "too-recently-compiled",
            CompileStatus::TimedOut => "timedout",
            CompileStatus::Terminated => "terminated",
            CompileStatus::Unavailable => "unavailable",
            CompileStatus::Other(s) => s,
        }
    }
}

impl From<&str> for CompileStatus {
    fn from(s: &str) -> Self {
        match s {
            "success" => CompileStatus::Success,
            "failure" => CompileStatus::Failure,
            "stopped-on-first-error" => CompileStatus::StoppedOnFirstError,
            "compile-in-progress" => CompileStatus::CompileInProgress,
            "too-recently-compiled" => CompileStatus::TooRecentlyCompiled,
            "timedout" => CompileStatus::TimedOut,
            "terminated" => CompileStatus::Terminated,
            "unavailable" => CompileStatus::Unavailable,
            other => CompileStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CompileStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(CompileStatus::from(s.as_str()))
    }
}

impl Serialize for CompileStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Output of a compile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    pub status: CompileStatus,
    /// The PDF output, when the build produced one.
    pub pdf: Option<OutputFileRef>,
}
