//! Request coalescing queue.
//!
//! # Data Flow
//! ```text
//! HTTP handlers (many tasks)
//!     → Enqueuer::enqueue (never blocks)
//!     → WaitQueue (one per route)
//!     → route worker: dequeue(timeout) wakes, drain_all() batches the rest
//! ```
//!
//! # Design Decisions
//! - Single consumer enforced by ownership: only one `WaitQueue` exists per pair
//! - Unbounded: inbound rate limiting is not this layer's concern

pub mod wait_queue;

pub use wait_queue::{wait_queue, Dequeued, Enqueuer, QueueClosed, WaitQueue};
