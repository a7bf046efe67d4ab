use axum::{extract::State, http::StatusCode};

use super::AppState;

/// Liveness/readiness probe: round-trips a trivial query against the pool.
pub async fn healthz(State(state): State<AppState>) -> StatusCode {
    match db::pool::health_check(&state.pool).await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
