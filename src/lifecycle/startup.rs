//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate the route table and log non-fatal warnings
//! - Build one cache entity per route (session + first compile)
//! - Spawn one worker per entity and publish the route table
//!
//! # Design Decisions
//! - Fail fast: any route that cannot produce its first artifact aborts startup
//! - Routes sharing a link initialize one after another, in declaration order,
//!   since the upstream rejects concurrent compiles of one project
//! - Distinct links initialize concurrently

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::cache::{CacheEntity, InitializationError};
use crate::config::validation::{join_errors, validate_config, ValidationError};
use crate::config::{GatewayConfig, RouteConfig};
use crate::lifecycle::Shutdown;
use crate::routing::RouteTable;
use crate::upstream::DocumentService;
use crate::worker::{self, RefreshSchedule};

/// Error type for startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid route table: {}", join_errors(.0))]
    InvalidConfig(Vec<ValidationError>),

    #[error("initialization failed: {0}")]
    Initialization(#[from] InitializationError),
}

/// Running workers and the table that reaches them.
#[derive(Debug)]
pub struct Gateway {
    pub routes: RouteTable,
    pub workers: Vec<JoinHandle<()>>,
}

/// Group routes by identical link. Groups appear in order of their first
/// route; routes within a group keep declaration order.
pub fn group_by_link(routes: &[RouteConfig]) -> Vec<Vec<&RouteConfig>> {
    let mut groups: Vec<Vec<&RouteConfig>> = Vec::new();
    for route in routes {
        match groups.iter_mut().find(|g| g[0].target.link == route.target.link) {
            Some(group) => group.push(route),
            None => groups.push(vec![route]),
        }
    }
    groups
}

/// Build every route's cache entity and start its worker.
pub async fn start_workers<S: DocumentService>(
    service: Arc<S>,
    config: &GatewayConfig,
    shutdown: &Shutdown,
) -> Result<Gateway, StartupError> {
    let warnings = validate_config(config).map_err(StartupError::InvalidConfig)?;
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    let session_timeout = Duration::from_secs(config.refresh.session_timeout_secs);
    let groups = group_by_link(&config.routes);

    tracing::info!(
        routes = config.routes.len(),
        groups = groups.len(),
        "Initializing route caches"
    );

    let builds = groups.into_iter().map(|group| {
        let service = service.clone();
        async move {
            let mut entities = Vec::with_capacity(group.len());
            for route in group {
                let entity = CacheEntity::create(
                    service.clone(),
                    route.path.clone(),
                    route.target.clone(),
                    session_timeout,
                )
                .await?;
                entities.push(entity);
            }
            Ok::<_, InitializationError>(entities)
        }
    });
    let entities = try_join_all(builds).await?;

    let schedule = RefreshSchedule::from_config(&config.refresh);
    let (handles, workers): (Vec<_>, Vec<_>) = entities
        .into_iter()
        .flatten()
        .map(|entity| worker::spawn(entity, schedule, session_timeout, shutdown.subscribe()))
        .unzip();
    let routes: RouteTable = handles.into_iter().collect();

    tracing::info!(routes = ?routes.paths(), "All routes ready");
    Ok(Gateway { routes, workers })
}
