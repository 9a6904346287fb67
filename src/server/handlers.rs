use crate::server::error::ApiError;
use crate::server::{pages, AppState, ROUTES};
use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpStream;

const DB_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_seconds: u64,
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(pages::index_html(&state.config))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        uptime_seconds: state.started.elapsed().as_secs(),
    })
}

pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = &state.config;
    Json(json!({
        "name": config.app_name,
        "version": config.app_version,
        "environment": config.environment,
        "region": config.region,
        "hostname": sysinfo::System::host_name(),
        "started_at": state.started_at.to_rfc3339(),
        "uptime_seconds": state.started.elapsed().as_secs(),
    }))
}

pub async fn system(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let monitor = state.monitor.clone();
    // sysinfo refreshes block
    let snapshot = tokio::task::spawn_blocking(move || monitor.host_snapshot())
        .await
        .map_err(|e| ApiError::internal(format!("system probe task failed: {}", e)))?
        .ok_or_else(|| ApiError::internal("system information unavailable"))?;

    Ok(Json(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "system": snapshot,
    })))
}

pub async fn db_check(State(state): State<AppState>) -> Response {
    let Some(db) = state.config.database.as_ref() else {
        return Json(json!({
            "status": "not_configured",
            "message": "DB_HOST is not set",
        }))
        .into_response();
    };

    let target = format!("{}:{}", db.host, db.port);
    let attempt = tokio::time::timeout(
        DB_CONNECT_TIMEOUT,
        TcpStream::connect((db.host.as_str(), db.port)),
    )
    .await;

    let error = match attempt {
        Ok(Ok(_stream)) => {
            return Json(json!({
                "status": "connected",
                "host": target,
                "database": db.name,
            }))
            .into_response();
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {}s", DB_CONNECT_TIMEOUT.as_secs()),
    };

    tracing::warn!("database check against {} failed: {}", target, error);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": "unreachable",
            "host": target,
            "database": db.name,
            "error": error,
        })),
    )
        .into_response()
}

pub async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    let available: Vec<String> = ROUTES
        .iter()
        .map(|r| format!("{} {}", r.method, r.path))
        .collect();

    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("Route {} {} not found", method, uri.path()),
            "available_routes": available,
        })),
    )
}
