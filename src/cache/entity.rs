//! Per-route cache entity and its refresh policy.
//!
//! # Responsibilities
//! - Hold the upstream session and the last good artifact for one route
//! - Recompile only when the upstream revision moves forward
//! - Classify compile outcomes as persistent or transient
//!
//! # Design Decisions
//! - An entity only exists once its first compile succeeded, so the
//!   artifact is never absent while serving
//! - Persistent failures advance the cached revision without touching the
//!   bytes; transient failures leave the cache exactly as it was
//! - Session expiry is not repaired here: the owner builds a new entity

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::config::schema::BuildTarget;
use crate::upstream::{
    current_revision, CompileResult, CompileStatus, DocumentService, OutputFileRef, UpstreamError, UpstreamResult,
};

/// The last successfully compiled document of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    /// Upstream revision this cache entry is considered current for.
    pub revision: u64,
    /// PDF bytes from the most recent successful compile.
    pub bytes: Bytes,
}

/// Why a revision cannot produce a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistentReason {
    /// The configured main file is not in the project tree.
    MissingMainFile(String),
    /// The compiler reported a definitive failure.
    CompileFailed(CompileStatus),
    /// The compile claimed success but yielded no PDF.
    NoOutput,
}

impl fmt::Display for PersistentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistentReason::MissingMainFile(path) => write!(f, "main file `{}` not found in project", path),
            PersistentReason::CompileFailed(status) => write!(f, "compile failed with status `{}`", status),
            PersistentReason::NoOutput => f.write_str("compile succeeded without producing a PDF"),
        }
    }
}

/// What a refresh did. Upstream errors are reported separately through `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Upstream revision equals the cached one.
    Hit { revision: u64 },
    /// A newer revision was compiled and cached.
    Compiled { revision: u64 },
    /// Upstream reports an older revision than cached. Nothing changed.
    Anomaly { upstream: u64, cached: u64 },
    /// The revision can never compile. Cached revision advanced, bytes kept.
    PersistentFailure { revision: u64, reason: PersistentReason },
    /// The compile may succeed on retry. Cache untouched.
    TransientFailure { revision: u64, status: CompileStatus },
}

impl RefreshOutcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Hit { .. } => "hit",
            RefreshOutcome::Compiled { .. } => "compiled",
            RefreshOutcome::Anomaly { .. } => "anomaly",
            RefreshOutcome::PersistentFailure { .. } => "persistent",
            RefreshOutcome::TransientFailure { .. } => "transient",
        }
    }
}

/// Result of asking the upstream to build one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileVerdict {
    Built(Bytes),
    Persistent(PersistentReason),
    Transient(CompileStatus),
}

/// Pick the PDF out of a successful compile, or decide whether a failed one
/// is worth retrying at the same revision.
pub fn classify(result: &CompileResult) -> Result<&OutputFileRef, CompileVerdict> {
    match (&result.status, &result.pdf) {
        (CompileStatus::Success, Some(pdf)) => Ok(pdf),
        (CompileStatus::Success, None) => Err(CompileVerdict::Persistent(PersistentReason::NoOutput)),
        (CompileStatus::Failure | CompileStatus::StoppedOnFirstError, _) => Err(CompileVerdict::Persistent(
            PersistentReason::CompileFailed(result.status.clone()),
        )),
        (status, _) => Err(CompileVerdict::Transient(status.clone())),
    }
}

/// Failure to build the initial cache entity for a route.
#[derive(Debug, Error)]
#[error("route `{route}`: {kind}")]
pub struct InitializationError {
    pub route: String,
    pub kind: InitFailure,
}

#[derive(Debug, Error)]
pub enum InitFailure {
    #[error("failed to open upstream session: {0}")]
    Session(#[source] UpstreamError),

    #[error("upstream error during initial compile: {0}")]
    Upstream(#[source] UpstreamError),

    #[error("initial compile cannot succeed: {0}")]
    Persistent(PersistentReason),

    #[error("initial compile did not complete (status `{0}`)")]
    Transient(CompileStatus),
}

/// Cache state for one route. Owned by exactly one worker.
pub struct CacheEntity<S: DocumentService> {
    route: String,
    target: BuildTarget,
    service: Arc<S>,
    session: S::Session,
    artifact: CachedArtifact,
}

impl<S: DocumentService> fmt::Debug for CacheEntity<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntity")
            .field("route", &self.route)
            .field("target", &self.target)
            .field("revision", &self.artifact.revision)
            .field("bytes", &self.artifact.bytes.len())
            .finish()
    }
}

impl<S: DocumentService> CacheEntity<S> {
    /// Open a session and perform the mandatory first compile.
    pub async fn create(
        service: Arc<S>,
        route: impl Into<String>,
        target: BuildTarget,
        session_timeout: Duration,
    ) -> Result<Self, InitializationError> {
        let route = route.into();
        let fail = |kind| InitializationError {
            route: route.clone(),
            kind,
        };

        let session = service
            .open_session(&target.link, session_timeout)
            .await
            .map_err(|e| fail(InitFailure::Session(e)))?;

        let revision = fetch_revision(service.as_ref(), &session)
            .await
            .map_err(|e| fail(InitFailure::Upstream(e)))?;

        let verdict = attempt_compile(service.as_ref(), &session, &target)
            .await
            .map_err(|e| fail(InitFailure::Upstream(e)))?;

        let bytes = match verdict {
            CompileVerdict::Built(bytes) => bytes,
            CompileVerdict::Persistent(reason) => return Err(fail(InitFailure::Persistent(reason))),
            CompileVerdict::Transient(status) => return Err(fail(InitFailure::Transient(status))),
        };

        tracing::info!(
            route = %route,
            link = %target.link,
            revision,
            size = bytes.len(),
            "Initial compile complete"
        );

        Ok(Self {
            route,
            target,
            service,
            session,
            artifact: CachedArtifact { revision, bytes },
        })
    }

    /// Bring the cache up to date with the upstream revision.
    pub async fn refresh(&mut self) -> UpstreamResult<RefreshOutcome> {
        let upstream = fetch_revision(self.service.as_ref(), &self.session).await?;
        let cached = self.artifact.revision;

        if upstream < cached {
            tracing::warn!(
                route = %self.route,
                upstream,
                cached,
                "Upstream revision is older than cached revision"
            );
            return Ok(RefreshOutcome::Anomaly { upstream, cached });
        }
        if upstream == cached {
            return Ok(RefreshOutcome::Hit { revision: cached });
        }

        let verdict = attempt_compile(self.service.as_ref(), &self.session, &self.target).await?;
        Ok(match verdict {
            CompileVerdict::Built(bytes) => {
                self.artifact = CachedArtifact {
                    revision: upstream,
                    bytes,
                };
                RefreshOutcome::Compiled { revision: upstream }
            }
            CompileVerdict::Persistent(reason) => {
                self.artifact.revision = upstream;
                RefreshOutcome::PersistentFailure {
                    revision: upstream,
                    reason,
                }
            }
            CompileVerdict::Transient(status) => RefreshOutcome::TransientFailure {
                revision: upstream,
                status,
            },
        })
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    pub fn artifact(&self) -> &CachedArtifact {
        &self.artifact
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }
}

async fn fetch_revision<S: DocumentService>(service: &S, session: &S::Session) -> UpstreamResult<u64> {
    let history = service.revision_history(session).await?;
    Ok(current_revision(&history))
}

async fn attempt_compile<S: DocumentService>(
    service: &S,
    session: &S::Session,
    target: &BuildTarget,
) -> UpstreamResult<CompileVerdict> {
    let root = match &target.main_file {
        Some(path) => match service.resolve_path(session, path).await? {
            Some(id) => Some(id),
            None => {
                return Ok(CompileVerdict::Persistent(PersistentReason::MissingMainFile(
                    path.clone(),
                )))
            }
        },
        None => None,
    };

    let result = service.compile(session, root.as_ref(), true).await?;
    match classify(&result) {
        Ok(pdf) => Ok(CompileVerdict::Built(service.fetch_file(session, pdf).await?)),
        Err(verdict) => Ok(verdict),
    }
}
