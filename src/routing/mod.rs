//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded request path
//!     → table.rs (exact match, no prefixes or patterns)
//!     → Some(WorkerHandle) → route worker
//!     → None → 404 at the transport layer
//! ```

pub mod table;

pub use table::RouteTable;
