//! The API layer's error type — every handler collapses whatever it
//! touched (`db`, `engine`, `scheduler`) into this, then `IntoResponse`
//! picks the status code once instead of every handler doing its own
//! `match`.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Scheduler(#[from] scheduler::SchedulerError),

    #[error(transparent)]
    Database(#[from] db::DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(db::DbError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Scheduler(scheduler::SchedulerError::Database(db::DbError::NotFound)) => StatusCode::NOT_FOUND,
            ApiError::Scheduler(scheduler::SchedulerError::AlreadyDeployed(_))
            | ApiError::Scheduler(scheduler::SchedulerError::NotDeployed(_)) => StatusCode::CONFLICT,
            ApiError::Scheduler(scheduler::SchedulerError::InvalidDefinition(_))
            | ApiError::Scheduler(scheduler::SchedulerError::Engine(_)) => StatusCode::BAD_REQUEST,
            ApiError::Scheduler(scheduler::SchedulerError::Database(_))
            | ApiError::Scheduler(scheduler::SchedulerError::ProviderResolution(_))
            | ApiError::Scheduler(scheduler::SchedulerError::DispatcherRegistration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
