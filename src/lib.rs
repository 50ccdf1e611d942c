//! Document gateway library.
//!
//! Serves compiled PDFs from a remote document service over HTTP, one cached
//! artifact per configured route, refreshed on demand and in the background.

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod queue;
pub mod routing;
pub mod upstream;
pub mod worker;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
