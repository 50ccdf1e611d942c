//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject route tables that cannot be served at all
//! - Flag suspicious but workable routes as warnings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<Vec<ValidationWarning>, Vec<ValidationError>>
//! - Warnings are returned to the caller, which decides how to log them

use thiserror::Error;
use url::Url;

use crate::config::schema::{BuildTarget, GatewayConfig};

/// A configuration problem that prevents startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no routes configured")]
    NoRoutes,

    #[error("route key must not be empty")]
    EmptyRouteKey,

    #[error("route `{0}` has an empty link")]
    EmptyLink(String),

    #[error("route `{route}` has an invalid link `{link}`: {reason}")]
    InvalidLink {
        route: String,
        link: String,
        reason: String,
    },

    #[error("refresh.interval_secs must be greater than zero")]
    ZeroRefreshInterval,

    #[error("refresh.jitter_secs ({jitter}) must be smaller than refresh.interval_secs ({interval})")]
    JitterTooLarge { jitter: u64, interval: u64 },
}

/// A configuration smell that is logged but tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationWarning {
    #[error("route `{0}` does not start with '/' and can never match a request path")]
    MissingLeadingSlash(String),

    #[error("route `{route}` uses what looks like a read-only link `{link}`; compiles need read-write access")]
    ReadOnlyLink { route: String, link: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<Vec<ValidationWarning>, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    for route in &config.routes {
        if route.path.is_empty() {
            errors.push(ValidationError::EmptyRouteKey);
            continue;
        }
        if !route.path.starts_with('/') {
            warnings.push(ValidationWarning::MissingLeadingSlash(route.path.clone()));
        }
        check_target(&route.path, &route.target, &mut errors, &mut warnings);
    }

    if config.refresh.interval_secs == 0 {
        errors.push(ValidationError::ZeroRefreshInterval);
    } else if config.refresh.jitter_secs >= config.refresh.interval_secs {
        errors.push(ValidationError::JitterTooLarge {
            jitter: config.refresh.jitter_secs,
            interval: config.refresh.interval_secs,
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(errors)
    }
}

fn check_target(
    route: &str,
    target: &BuildTarget,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationWarning>,
) {
    if target.link.trim().is_empty() {
        errors.push(ValidationError::EmptyLink(route.to_string()));
        return;
    }

    let invalid = |reason: String| ValidationError::InvalidLink {
        route: route.to_string(),
        link: target.link.clone(),
        reason,
    };

    match Url::parse(&target.link) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            if is_read_only_link(&url) {
                warnings.push(ValidationWarning::ReadOnlyLink {
                    route: route.to_string(),
                    link: target.link.clone(),
                });
            }
        }
        Ok(url) => errors.push(invalid(format!("unsupported scheme `{}`", url.scheme()))),
        Err(e) => errors.push(invalid(e.to_string())),
    }
}

/// Render a list of errors on one line.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Share links of the form `.../read/<token>` grant view access only.
pub fn is_read_only_link(url: &Url) -> bool {
    url.path_segments()
        .map(|mut segments| segments.any(|s| s == "read"))
        .unwrap_or(false)
}
