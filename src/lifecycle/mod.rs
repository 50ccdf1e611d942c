//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate routes → group by link → initial compiles → spawn workers → route table
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → workers exit their loops
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Listener binds only after every route has an artifact
//! - No partial startup: one failing route stops the process

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{group_by_link, start_workers, Gateway, StartupError};
