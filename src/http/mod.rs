//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → decoded path → route table lookup
//!     → miss: 404; hit: WorkerHandle::serve, await the cycle's artifact
//!     → 200 application/pdf
//! ```

pub mod server;

pub use server::{AppState, HttpServer, PDF_CONTENT_TYPE};
