use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub sessions: String,
    pub index: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let sessions_status = match state.sessions.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "session store unreachable");
            "disconnected"
        }
    };
    let index_status = if state.index.summary().await.is_some() {
        "ready"
    } else {
        "missing"
    };

    let is_ready = sessions_status == "connected" && index_status == "ready";
    let response = ReadinessResponse {
        status: if is_ready { "ready" } else { "not_ready" }.into(),
        sessions: sessions_status.into(),
        index: index_status.into(),
    };

    let code = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}
