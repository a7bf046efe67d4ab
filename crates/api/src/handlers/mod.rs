pub mod deployments;
pub mod executions;
pub mod health;
pub mod secrets;
pub mod webhooks;
pub mod workflows;

pub use crate::AppState;
