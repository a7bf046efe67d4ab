//! `workflow-orchestrator` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`     — start the API server.
//! - `worker`    — start a queue worker.
//! - `migrate`   — run pending database migrations.
//! - `validate`  — validate a workflow JSON file.
//! - `deploy`    — deploy a workflow by id.
//! - `undeploy`  — undeploy a workflow by id.

mod config;
mod providers;
mod worker;

use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use config::Config;

#[derive(Parser)]
#[command(
    name = "workflow-orchestrator",
    about = "High-performance workflow automation engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Start a background worker that processes queued jobs.
    Worker,
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: std::path::PathBuf,
    },
    /// Deploy a workflow, registering its triggers.
    Deploy {
        workflow_id: Uuid,
        /// Resolve this user's stored GitHub/Slack credentials into the
        /// deployed trigger specs.
        #[arg(long)]
        owner_id: Option<Uuid>,
    },
    /// Undeploy a workflow, unregistering its triggers.
    Undeploy { workflow_id: Uuid },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or(config.bind_addr.clone());
            info!("Starting API server on {bind}");
            let pool = db::pool::create_pool(&config.database_url, 10)
                .await
                .expect("failed to connect to database");

            let secrets = api::WebhookSecrets {
                github_webhook_secret: config.github_webhook_secret.clone(),
                slack_signing_secret: config.slack_signing_secret.clone(),
            };

            api::serve(&bind, pool, secrets).await.unwrap();
        }
        Command::Worker => {
            info!("Starting background worker");
            let pool = db::pool::create_pool(&config.database_url, 10)
                .await
                .expect("failed to connect to database");
            worker::run(pool, config).await;
        }
        Command::Migrate { database_url } => {
            info!("Running migrations against {database_url}");
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .expect("failed to connect to database");
            db::pool::run_migrations(&pool)
                .await
                .expect("migration failed");
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("cannot read file {}: {e}", path.display()));

            let workflow: engine::Workflow = serde_json::from_str(&content)
                .unwrap_or_else(|e| panic!("invalid JSON: {e}"));

            match engine::schedulable_levels(&workflow) {
                Ok(levels) => {
                    println!("workflow is valid, {} schedulable levels: {levels:?}", levels.len());
                }
                Err(e) => {
                    eprintln!("validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Deploy { workflow_id, owner_id } => {
            let pool = db::pool::create_pool(&config.database_url, 2)
                .await
                .expect("failed to connect to database");
            let manager = scheduler::DeploymentManager::new(pool.clone())
                .with_oauth_store(std::sync::Arc::new(scheduler::PgOAuthTokenStore::new(pool)))
                .with_channel_resolver(std::sync::Arc::new(scheduler::SlackConversationsListResolver::new(reqwest::Client::new())));
            let outcome = match owner_id {
                Some(owner_id) => manager.deploy_for_owner(workflow_id, owner_id).await,
                None => manager.deploy(workflow_id).await,
            };
            match outcome {
                Ok(outcome) => println!("deployed: {outcome:?}"),
                Err(e) => {
                    eprintln!("deploy failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Undeploy { workflow_id } => {
            let pool = db::pool::create_pool(&config.database_url, 2)
                .await
                .expect("failed to connect to database");
            let manager = scheduler::DeploymentManager::new(pool);
            match manager.undeploy(workflow_id).await {
                Ok(outcome) => println!("undeployed: {outcome:?}"),
                Err(e) => {
                    eprintln!("undeploy failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
