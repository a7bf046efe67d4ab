//! `scheduler` crate — trigger indexing, event routing, cron dispatch, and
//! deployment lifecycle management (C1-C4).
//!
//! Named after the original system's `workflow_scheduler` package — this
//! crate replaces the teacher's unused `queue` stub, which carried a
//! dependency list but no implementation.

pub mod deployment;
pub mod dispatch;
pub mod error;
pub mod index;
pub mod models;
pub mod oauth;
pub mod router;
pub mod signature;

pub use deployment::{DeploymentManager, SlackChannelResolver, SlackConversationsListResolver};
pub use dispatch::{CronScheduleRegistry, TriggerDispatchRegistry};
pub use error::SchedulerError;
pub use models::{DeploymentOutcome, DeploymentStatus, TriggerSpec, TriggerType};
pub use oauth::{OAuthToken, OAuthTokenStore, PgOAuthTokenStore};
