//! Demo web service deployed by the ECS/EKS workflows.
//!
//! Exposes a static landing page, a health endpoint for load balancer
//! target groups and a few informational JSON routes.

pub mod error;
pub mod handlers;
pub mod pages;

use crate::config::ServerConfig;
use crate::utils::error::{LaunchError, Result};
use crate::utils::monitor::SystemMonitor;
use axum::{
    handler::Handler,
    routing::{get, MethodRouter},
    Router,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub struct RouteInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

/// Known endpoints, listed by the landing page and the 404 envelope.
pub const ROUTES: &[RouteInfo] = &[
    RouteInfo {
        method: "GET",
        path: "/",
        description: "landing page",
    },
    RouteInfo {
        method: "GET",
        path: "/health",
        description: "health check",
    },
    RouteInfo {
        method: "GET",
        path: "/api/info",
        description: "application info",
    },
    RouteInfo {
        method: "GET",
        path: "/api/system",
        description: "host system info",
    },
    RouteInfo {
        method: "GET",
        path: "/db-check",
        description: "database connectivity",
    },
];

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub monitor: Arc<SystemMonitor>,
    pub started_at: DateTime<Utc>,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            monitor: Arc::new(SystemMonitor::default()),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get_only(handlers::index))
        .route("/health", get_only(handlers::health))
        .route("/api/info", get_only(handlers::info))
        .route("/api/system", get_only(handlers::system))
        .route("/db-check", get_only(handlers::db_check))
        .fallback(handlers::not_found)
}

/// GET route whose other methods get the JSON 404 envelope instead of an empty 405.
fn get_only<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    get(handler).fallback(handlers::not_found)
}

/// Request tracing, plus panics turned into a JSON 500.
pub fn with_middleware(router: Router<AppState>) -> Router<AppState> {
    router
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(TraceLayer::new_for_http())
}

pub fn router(state: AppState) -> Router {
    with_middleware(routes()).with_state(state)
}

pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("🌐 {} listening on {}", state.config.app_name, addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| LaunchError::ServerError {
            message: e.to_string(),
        })
}
