use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

pub const SERVICE_NAME: &str = "gleaner";

#[derive(Debug, Serialize)]
pub struct RootResponse {
    service: &'static str,
    message: String,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        service: SERVICE_NAME,
        message: format!("{SERVICE_NAME} is running"),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    details: HealthDetails,
}

#[derive(Debug, Serialize)]
pub struct HealthDetails {
    source_store: &'static str,
    sink_store: &'static str,
    scheduler: &'static str,
}

/// Liveness of both stores and the periodic job. Degraded states answer 503
/// so an orchestrator can restart the service.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let source_ok = state.source.ping().await;
    let sink_ok = state.sink.ping().await;
    let scheduler_ok = state.scheduler.as_ref().is_some_and(|s| s.is_running());

    let details = HealthDetails {
        source_store: if source_ok { "connected" } else { "error (ping failed)" },
        sink_store: if sink_ok { "connected" } else { "error (ping failed)" },
        scheduler: if scheduler_ok { "running" } else { "stopped" },
    };

    if source_ok && sink_ok && scheduler_ok {
        (StatusCode::OK, Json(HealthResponse { status: "ok", details }))
    } else {
        tracing::warn!(?details, "health check reporting degraded");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse { status: "degraded", details }),
        )
    }
}
