//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the document gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// TCP port the HTTP listener binds on all interfaces.
    pub port: u16,

    /// Route table in declaration order.
    #[serde(deserialize_with = "deserialize_routes", serialize_with = "serialize_routes")]
    pub routes: Vec<RouteConfig>,

    /// Background refresh policy.
    pub refresh: RefreshConfig,

    /// Upstream document service client settings.
    pub upstream: UpstreamConfig,

    /// Inbound HTTP settings.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 80,
            routes: Vec::new(),
            refresh: RefreshConfig::default(),
            upstream: UpstreamConfig::default(),
            http: HttpConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// A configured route: the HTTP path and the document it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteConfig {
    /// Path key, matched exactly against the decoded request path.
    pub path: String,

    /// What this route compiles.
    pub target: BuildTarget,
}

/// Upstream build target: project link plus optional main file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuildTarget {
    /// Project share link.
    pub link: String,

    /// Path of the root document inside the project tree.
    #[serde(default, alias = "mainFile", skip_serializing_if = "Option::is_none")]
    pub main_file: Option<String>,
}

/// Background refresh policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Mean time between background refreshes in seconds.
    pub interval_secs: u64,

    /// Maximum deviation from `interval_secs` in either direction.
    pub jitter_secs: u64,

    /// Timeout for opening an upstream session in seconds.
    pub session_timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 4 * 60 * 60,
            jitter_secs: 30 * 60,
            session_timeout_secs: 30,
        }
    }
}

/// Upstream client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Per-call timeout for upstream HTTP requests in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
        }
    }
}

/// Inbound HTTP configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Total time a client may wait for a response, including a compile.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 600,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

// `[routes]` is a TOML table keyed by path. Visiting it as a map keeps the
// document order, which startup grouping depends on.
fn deserialize_routes<'de, D>(deserializer: D) -> Result<Vec<RouteConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    struct RoutesVisitor;

    impl<'de> Visitor<'de> for RoutesVisitor {
        type Value = Vec<RouteConfig>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a table mapping paths to build targets")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut routes = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((path, target)) = map.next_entry::<String, BuildTarget>()? {
                if routes.iter().any(|r: &RouteConfig| r.path == path) {
                    return Err(serde::de::Error::custom(format!("duplicate route `{}`", path)));
                }
                routes.push(RouteConfig { path, target });
            }
            Ok(routes)
        }
    }

    deserializer.deserialize_map(RoutesVisitor)
}

#[allow(clippy::ptr_arg)]
fn serialize_routes<S>(routes: &Vec<RouteConfig>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(routes.len()))?;
    for route in routes {
        map.serialize_entry(&route.path, &route.target)?;
    }
    map.end()
}
