//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the document handler
//! - Wire up middleware (tracing, request ID, timeout)
//! - Map decoded paths onto route workers
//! - Turn worker replies into `application/pdf` responses

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::HttpConfig;
use crate::routing::RouteTable;

/// Content type of every successful response.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
}

/// HTTP front end of the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server serving `routes`.
    pub fn new(routes: RouteTable, config: &HttpConfig) -> Self {
        let state = AppState {
            routes: Arc::new(routes),
        };
        let router = Self::build_router(config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run top to bottom on the way in: the request id is assigned
    /// before tracing so every span carries it.
    #[allow(deprecated)]
    fn build_router(config: &HttpConfig, state: AppState) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)));

        Router::new()
            .route("/", any(root_handler))
            .route("/{*path}", any(document_handler))
            .with_state(state)
            .layer(middleware)
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn root_handler(State(state): State<AppState>) -> Response {
    serve_path(&state, "/").await
}

/// Wildcard segment arrives percent-decoded; invalid encodings are rejected
/// with 400 by the extractor before this runs.
async fn document_handler(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    serve_path(&state, &format!("/{}", path)).await
}

async fn serve_path(state: &AppState, path: &str) -> Response {
    let Some(worker) = state.routes.lookup(path) else {
        tracing::debug!(path = %path, "No route matched");
        return (StatusCode::NOT_FOUND, "No document configured for this path").into_response();
    };

    match worker.fetch().await {
        Ok(bytes) => (StatusCode::OK, [(header::CONTENT_TYPE, PDF_CONTENT_TYPE)], bytes).into_response(),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Worker unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, "Document temporarily unavailable").into_response()
        }
    }
}
