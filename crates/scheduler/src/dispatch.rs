//! Trigger Dispatchers (C3) — one per trigger family, each owning the
//! in-memory side of its trigger (cron scheduler, webhook route table,
//! mention detection) and invoking the engine when fired (spec.md §4.3).
//!
//! `TriggerDispatchRegistry` is the half of C3 the deployment manager
//! touches directly: registering/unregistering a workflow's specs so
//! deploy can run it in parallel with the C1 index insert and roll back
//! either side if the other fails (spec.md:158). `WEBHOOK`/`GITHUB`/
//! `SLACK`/`MANUAL` triggers are reactive — C1 alone is sufficient to
//! route an inbound event to them, so the registry's only real in-memory
//! state is the `CRON` family's parsed schedule cache; the rest register
//! as a no-op validation pass.
//!
//! A real cron-expression parser (the `cron` crate) replaces both the
//! teacher's and the original system's lack of genuine cron scheduling —
//! an explicit upgrade noted in the grounding ledger.

use chrono::{DateTime, Utc};
use cron::Schedule;
use dashmap::DashMap;
use std::str::FromStr;
use uuid::Uuid;

use db::models::TriggerIndexRowData;

use crate::error::SchedulerError;
use crate::models::{TriggerSpec, TriggerType};

/// A cron trigger that is due to fire as of `now`.
#[derive(Debug, Clone)]
pub struct DueTrigger {
    pub workflow_id: Uuid,
    pub expression: String,
}

/// C3's register/unregister half — what `DeploymentManager` calls
/// alongside `index::register`/`index::unregister`.
#[async_trait::async_trait]
pub trait TriggerDispatchRegistry: Send + Sync {
    async fn register(&self, workflow_id: Uuid, specs: &[TriggerSpec]) -> Result<(), SchedulerError>;
    async fn unregister(&self, workflow_id: Uuid) -> Result<(), SchedulerError>;
}

/// Production `TriggerDispatchRegistry`: validates and caches every
/// `CRON` trigger's parsed `cron::Schedule` in memory, keyed by workflow.
///
/// Parsing up front at deploy time (rather than lazily at poll time, as
/// [`due_triggers`] alone would) turns a malformed cron expression into a
/// deploy-time rejection instead of a workflow that deploys successfully
/// and then silently never fires — `due_triggers` already has to skip
/// unparsable rows defensively, but that defensiveness should never be the
/// only thing standing between a typo and a workflow nobody notices is dead.
pub struct CronScheduleRegistry {
    schedules: DashMap<Uuid, Vec<Schedule>>,
}

impl CronScheduleRegistry {
    pub fn new() -> Self {
        Self { schedules: DashMap::new() }
    }

    /// Number of workflows with at least one cached cron schedule.
    pub fn registered_workflow_count(&self) -> usize {
        self.schedules.len()
    }
}

impl Default for CronScheduleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TriggerDispatchRegistry for CronScheduleRegistry {
    async fn register(&self, workflow_id: Uuid, specs: &[TriggerSpec]) -> Result<(), SchedulerError> {
        let mut parsed = Vec::new();
        for spec in specs {
            if spec.trigger_type != TriggerType::Cron {
                continue;
            }
            let schedule = Schedule::from_str(&spec.index_key).map_err(|e| {
                SchedulerError::DispatcherRegistration(format!("invalid cron expression '{}': {e}", spec.index_key))
            })?;
            parsed.push(schedule);
        }

        if parsed.is_empty() {
            self.schedules.remove(&workflow_id);
        } else {
            self.schedules.insert(workflow_id, parsed);
        }
        Ok(())
    }

    async fn unregister(&self, workflow_id: Uuid) -> Result<(), SchedulerError> {
        self.schedules.remove(&workflow_id);
        Ok(())
    }
}

/// List every active `CRON` trigger registration.
pub async fn active_cron_triggers(pool: &db::DbPool) -> Result<Vec<TriggerIndexRowData>, db::DbError> {
    db::repository::trigger_index::list_active(pool, TriggerType::Cron.as_str()).await
}

/// From a set of active cron registrations, find every one whose schedule
/// has a fire time in `(since, now]`.
///
/// Invalid cron expressions are skipped rather than failing the whole
/// dispatch pass — a single malformed workflow must never block every
/// other scheduled workflow.
pub fn due_triggers(rows: &[TriggerIndexRowData], since: DateTime<Utc>, now: DateTime<Utc>) -> Vec<DueTrigger> {
    rows.iter()
        .filter_map(|row| {
            let schedule = Schedule::from_str(&row.index_key).ok()?;
            let fires = schedule.after(&since).take_while(|t| *t <= now).next();
            fires.map(|_| DueTrigger {
                workflow_id: row.workflow_id,
                expression: row.index_key.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(expression: &str) -> TriggerIndexRowData {
        TriggerIndexRowData {
            id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            trigger_type: "CRON".to_string(),
            index_key: expression.to_string(),
            trigger_config: serde_json::Value::Null,
            deployment_status: "active".to_string(),
        }
    }

    #[test]
    fn every_minute_schedule_is_due_within_a_two_minute_window() {
        let rows = vec![row("0 * * * * *")];
        let now = Utc::now();
        let since = now - Duration::minutes(2);
        let due = due_triggers(&rows, since, now);
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn invalid_expression_is_skipped_not_fatal() {
        let rows = vec![row("not a cron expression")];
        let now = Utc::now();
        let since = now - Duration::minutes(2);
        assert!(due_triggers(&rows, since, now).is_empty());
    }

    fn spec(trigger_type: TriggerType, index_key: &str) -> TriggerSpec {
        TriggerSpec { trigger_type, index_key: index_key.to_string(), trigger_config: serde_json::json!({}) }
    }

    #[tokio::test]
    async fn valid_cron_spec_registers_without_error() {
        let registry = CronScheduleRegistry::new();
        let workflow_id = Uuid::new_v4();
        registry.register(workflow_id, &[spec(TriggerType::Cron, "0 * * * * *")]).await.unwrap();
        assert_eq!(registry.registered_workflow_count(), 1);
    }

    #[tokio::test]
    async fn malformed_cron_expression_is_rejected_at_register_time() {
        let registry = CronScheduleRegistry::new();
        let workflow_id = Uuid::new_v4();
        let err = registry.register(workflow_id, &[spec(TriggerType::Cron, "not a cron expression")]).await;
        assert!(err.is_err());
        assert_eq!(registry.registered_workflow_count(), 0);
    }

    #[tokio::test]
    async fn non_cron_specs_register_as_a_no_op() {
        let registry = CronScheduleRegistry::new();
        let workflow_id = Uuid::new_v4();
        registry.register(workflow_id, &[spec(TriggerType::Webhook, "orders-hook")]).await.unwrap();
        assert_eq!(registry.registered_workflow_count(), 0);
    }

    #[tokio::test]
    async fn unregister_clears_the_cached_schedule() {
        let registry = CronScheduleRegistry::new();
        let workflow_id = Uuid::new_v4();
        registry.register(workflow_id, &[spec(TriggerType::Cron, "0 * * * * *")]).await.unwrap();
        registry.unregister(workflow_id).await.unwrap();
        assert_eq!(registry.registered_workflow_count(), 0);
    }
}
