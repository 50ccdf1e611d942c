//! Route worker subsystem.
//!
//! # Data Flow
//! ```text
//! WorkerHandle::serve (HTTP task)
//!     → wait queue
//!     → route_worker.rs loop: refresh cache entity, drain, respond
//!
//! schedule.rs:
//!     jittered idle timeout → background refresh with no requests
//! ```
//!
//! # Design Decisions
//! - One task per route; the cache entity never leaves it, so no locks
//! - At most one refresh in flight per route, never cancelled once started
//! - Refresh failures are logged and the last good artifact is served

pub mod route_worker;
pub mod schedule;

pub use route_worker::{spawn, PendingRequest, RouteWorker, WorkerHandle, WorkerStopped};
pub use schedule::RefreshSchedule;
