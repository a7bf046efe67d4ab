//! Repository functions — one function per database operation.
//!
//! Every function takes a `&DbPool` and returns a `Result<T, DbError>`.
//! No business logic, no domain types — pure SQL.

pub mod deployment_history;
pub mod executions;
pub mod github_events;
pub mod jobs;
pub mod logs;
pub mod oauth;
pub mod secrets;
pub mod trigger_index;
pub mod workflows;
