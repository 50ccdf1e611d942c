//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, warnings logged)
//!     → GatewayConfig (validated, immutable)
//!     → consumed once by startup; routes never change at runtime
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields except `routes` have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BuildTarget;
pub use schema::GatewayConfig;
pub use schema::RefreshConfig;
pub use schema::RouteConfig;
