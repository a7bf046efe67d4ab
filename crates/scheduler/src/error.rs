//! Scheduler-level error type.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    #[error("workflow definition is not valid JSON for a workflow: {0}")]
    InvalidDefinition(String),

    #[error("workflow '{0}' is already deployed")]
    AlreadyDeployed(Uuid),

    #[error("workflow '{0}' is not deployed")]
    NotDeployed(Uuid),

    #[error("engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("provider context resolution failed: {0}")]
    ProviderResolution(String),

    #[error("trigger dispatcher registration failed: {0}")]
    DispatcherRegistration(String),
}
