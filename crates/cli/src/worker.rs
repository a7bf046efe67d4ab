//! Background job-queue worker.
//!
//! Polls `job_queue` for pending jobs (`SELECT … FOR UPDATE SKIP
//! LOCKED`), runs each through a `WorkflowExecutor` built from the
//! built-in node registry, and reports the outcome back to the queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nodes::traits::NodeType;
use nodes::NodeRegistry;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::providers;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const CRON_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub fn build_registry() -> NodeRegistry {
    let http = reqwest::Client::new();
    let mut registry = NodeRegistry::new();

    registry.register_many(
        NodeType::Trigger,
        ["WEBHOOK", "SLACK", "GITHUB", "CRON", "MANUAL"],
        Arc::new(nodes::runners::trigger::TriggerRunner),
    );

    let ai_runner = Arc::new(nodes::runners::ai_agent::AiAgentRunner::new(Arc::new(providers::StubAiProvider)));
    registry.register_many(NodeType::AiAgent, ["OPENAI_CHATGPT", "ANTHROPIC_CLAUDE", "GOOGLE_GEMINI"], ai_runner);

    let slack_token = std::env::var("SLACK_BOT_TOKEN").unwrap_or_default();
    let external_action_runner = Arc::new(nodes::runners::external_action::ExternalActionRunner::new(
        Arc::new(providers::SlackHttpClient::new(http.clone(), slack_token)),
        Arc::new(providers::StubGithubClient),
    ));
    registry.register_many(
        NodeType::ExternalAction,
        ["SLACK", "GITHUB", "GOOGLE_CALENDAR", "NOTION"],
        external_action_runner,
    );

    registry.register(NodeType::Flow, "IF", Arc::new(nodes::runners::flow::IfRunner));
    registry.register(NodeType::Flow, "SWITCH", Arc::new(nodes::runners::flow::SwitchRunner));
    registry.register(NodeType::Flow, "WHILE", Arc::new(nodes::runners::flow::WhileRunner));
    registry.register(NodeType::Flow, "MERGE", Arc::new(nodes::runners::flow::MergeRunner));

    registry.register_many(
        NodeType::HumanInTheLoop,
        ["APPROVAL", "WAIT_FOR_INPUT"],
        Arc::new(nodes::runners::hil::HilRunner),
    );

    let tool_runner = Arc::new(nodes::runners::tool::ToolRunner::new(Arc::new(providers::StubToolInvoker)));
    registry.register_many(NodeType::Tool, ["CUSTOM_TOOL", "HTTP_TOOL", "CODE_INTERPRETER"], tool_runner);

    registry.register(NodeType::Action, "HTTP_REQUEST", Arc::new(nodes::runners::action::ActionRunner::new(http)));

    registry
}

pub async fn run(pool: db::DbPool, config: Config) -> ! {
    let registry = Arc::new(build_registry());
    let logger = Arc::new(engine::logger::ExecutionLogger::new(config.log_ring_capacity));
    let executor = engine::WorkflowExecutor::new(pool.clone(), registry, logger, engine::ExecutorConfig::default());

    tokio::spawn(cron_dispatch_loop(pool.clone()));

    info!("worker polling job_queue");

    loop {
        match db::repository::jobs::fetch_next_job(&pool).await {
            Ok(Some(job)) => {
                if let Err(e) = process_job(&pool, &executor, &job).await {
                    warn!(job_id = %job.id, error = %e, "job failed");
                    let _ = db::repository::jobs::fail_job(&pool, job.id, job.max_attempts).await;
                } else {
                    let _ = db::repository::jobs::complete_job(&pool, job.id).await;
                }
            }
            Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
            Err(e) => {
                error!(error = %e, "failed to poll job queue");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

/// Periodically check every active `CRON` trigger registration and enqueue
/// a job for each one due since the last check.
async fn cron_dispatch_loop(pool: db::DbPool) {
    let mut since = chrono::Utc::now();

    loop {
        tokio::time::sleep(CRON_POLL_INTERVAL).await;
        let now = chrono::Utc::now();

        match scheduler::dispatch::active_cron_triggers(&pool).await {
            Ok(rows) => {
                for due in scheduler::dispatch::due_triggers(&rows, since, now) {
                    if let Err(e) = dispatch_cron_trigger(&pool, due.workflow_id).await {
                        warn!(workflow_id = %due.workflow_id, error = %e, "failed to dispatch cron trigger");
                    }
                }
            }
            Err(e) => error!(error = %e, "failed to list active cron triggers"),
        }

        since = now;
    }
}

async fn dispatch_cron_trigger(pool: &db::DbPool, workflow_id: uuid::Uuid) -> Result<(), db::DbError> {
    let workflow = db::repository::workflows::get_workflow(pool, workflow_id).await?;
    let trigger_data = serde_json::json!({});
    let exec = db::repository::executions::create_execution(pool, workflow_id, workflow.version, trigger_data.clone()).await?;
    db::repository::jobs::enqueue_job(pool, exec.id, workflow_id, trigger_data).await?;
    Ok(())
}

async fn process_job(
    pool: &db::DbPool,
    executor: &engine::WorkflowExecutor,
    job: &db::models::JobRow,
) -> Result<(), engine::EngineError> {
    let result = match (&job.resume_node_id, &job.resolved_input) {
        (Some(node_id), Some(resolved_input)) => {
            executor.resume_node(job.execution_id, node_id, resolved_input.clone()).await?
        }
        _ => {
            let workflow_row = db::repository::workflows::get_workflow(pool, job.workflow_id).await?;
            let workflow: engine::Workflow = serde_json::from_value(workflow_row.definition)
                .map_err(|e| engine::EngineError::InvalidDefinition(e.to_string()))?;

            let secret_rows = db::repository::secrets::list_for_workflow(pool, job.workflow_id).await?;
            let secrets: HashMap<String, String> =
                secret_rows.into_iter().map(|row| (row.key, row.encrypted_value)).collect();

            executor.run(&workflow, workflow_row.version, job.payload.clone(), secrets).await?
        }
    };

    if !result.failed_nodes.is_empty() {
        warn!(execution_id = %result.execution_id, failed = ?result.failed_nodes, "execution completed with failures");
    }
    if let Some(node_id) = &result.paused_node {
        info!(execution_id = %result.execution_id, node_id, "execution paused awaiting human input");
    }

    Ok(())
}
