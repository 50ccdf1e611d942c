//! Upstream document service subsystem.
//!
//! # Data Flow
//! ```text
//! cache entity refresh
//!     → client.rs (DocumentService trait)
//!     → http.rs (reqwest implementation)
//!     → remote service: session, history, resolve, compile, fetch
//! ```
//!
//! # Design Decisions
//! - The core is generic over `DocumentService`; tests plug in scripted fakes
//! - Every call may fail; failures are classified in types.rs, not here

pub mod client;
pub mod http;
pub mod types;

pub use client::DocumentService;
pub use http::{HttpDocumentService, HttpSession};
pub use types::{
    current_revision, CompileResult, CompileStatus, FileId, OutputFileRef, RevisionDescriptor, UpstreamError,
    UpstreamResult,
};
