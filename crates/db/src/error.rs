//! Typed error type for the db crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// `pool::health_check` didn't get a response within its deadline —
    /// distinct from [`DbError::Sqlx`] so callers can tell a slow/dead pool
    /// apart from a query the database actively rejected.
    #[error("database health check timed out")]
    HealthCheckTimeout,
}
