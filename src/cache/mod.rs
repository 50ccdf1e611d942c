//! Route cache subsystem.
//!
//! # Data Flow
//! ```text
//! worker cycle
//!     → entity.rs refresh(): revision query
//!     → newer revision? resolve main file → compile → fetch PDF
//!     → classify outcome, update CachedArtifact per policy
//! ```

pub mod entity;

pub use entity::{
    classify, CacheEntity, CachedArtifact, CompileVerdict, InitFailure, InitializationError, PersistentReason,
    RefreshOutcome,
};
