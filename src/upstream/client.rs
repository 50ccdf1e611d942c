//! Document service client interface.
//!
//! The gateway core only talks to the upstream through [`DocumentService`].
//! Sessions are opaque to the core and owned by exactly one cache entity.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::upstream::types::{CompileResult, FileId, OutputFileRef, RevisionDescriptor, UpstreamResult};

/// Remote document compilation service.
#[async_trait]
pub trait DocumentService: Send + Sync + 'static {
    /// Authenticated connection to one project.
    type Session: Send + Sync + 'static;

    /// Open a session for the project behind `link`.
    async fn open_session(&self, link: &str, timeout: Duration) -> UpstreamResult<Self::Session>;

    /// Revision history, newest entry first.
    async fn revision_history(&self, session: &Self::Session) -> UpstreamResult<Vec<RevisionDescriptor>>;

    /// Resolve a path in the project tree. `Ok(None)` when it does not exist.
    async fn resolve_path(&self, session: &Self::Session, path: &str) -> UpstreamResult<Option<FileId>>;

    /// Compile the project, optionally against a specific root document.
    async fn compile(
        &self,
        session: &Self::Session,
        root: Option<&FileId>,
        stop_on_first_error: bool,
    ) -> UpstreamResult<CompileResult>;

    /// Download a build output.
    async fn fetch_file(&self, session: &Self::Session, output: &OutputFileRef) -> UpstreamResult<Bytes>;
}
