//! `api` crate — HTTP REST API layer
//!
//! Exposes:
//!   GET    /api/v1/workflows
//!   POST   /api/v1/workflows
//!   GET    /api/v1/workflows/:id
//!   PUT    /api/v1/workflows/:id
//!   DELETE /api/v1/workflows/:id
//!   POST   /api/v1/workflows/:id/deploy
//!   POST   /api/v1/workflows/:id/undeploy
//!   POST   /api/v1/workflows/:id/pause
//!   POST   /api/v1/workflows/:id/resume
//!   POST   /api/v1/workflows/:id/execute
//!   GET    /api/v1/workflows/:id/secrets
//!   PUT    /api/v1/workflows/:id/secrets
//!   DELETE /api/v1/workflows/:id/secrets/:key
//!   GET    /api/v1/executions/:id
//!   GET    /api/v1/executions/:id/logs
//!   POST   /api/v1/executions/:id/nodes/:node_id/resume
//!   GET    /healthz
//!   POST   /webhook/workflow/:workflow_id
//!   POST   /webhooks/github
//!   POST   /webhooks/slack/events
//!   POST   /webhooks/slack/commands

pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use db::DbPool;
use scheduler::DeploymentManager;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Secrets the webhook handlers need to verify inbound signatures.
#[derive(Clone, Default)]
pub struct WebhookSecrets {
    pub github_webhook_secret: String,
    pub slack_signing_secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub scheduler: Arc<DeploymentManager>,
    pub logger: Arc<engine::logger::ExecutionLogger>,
    pub secrets: WebhookSecrets,
}

pub async fn serve(bind: &str, pool: DbPool, secrets: WebhookSecrets) -> Result<(), std::io::Error> {
    let state = AppState {
        scheduler: Arc::new(DeploymentManager::new(pool.clone())),
        logger: Arc::new(engine::logger::ExecutionLogger::default()),
        pool,
        secrets,
    };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let workflow_router = Router::new()
        .route("/workflows", get(handlers::workflows::list).post(handlers::workflows::create))
        .route("/workflows/:id", get(handlers::workflows::get).put(handlers::workflows::update).delete(handlers::workflows::delete))
        .route("/workflows/:id/deploy", post(handlers::deployments::deploy))
        .route("/workflows/:id/undeploy", post(handlers::deployments::undeploy))
        .route("/workflows/:id/pause", post(handlers::deployments::pause))
        .route("/workflows/:id/resume", post(handlers::deployments::resume))
        .route("/workflows/:id/execute", post(handlers::executions::execute))
        .route("/workflows/:id/secrets", get(handlers::secrets::list).put(handlers::secrets::set))
        .route("/workflows/:id/secrets/:key", axum::routing::delete(handlers::secrets::delete))
        .route("/executions/:id", get(handlers::executions::get))
        .route("/executions/:id/logs", get(handlers::executions::logs))
        .route("/executions/:id/nodes/:node_id/resume", post(handlers::executions::resume_node));

    let webhook_router = Router::new()
        .route("/webhook/workflow/:workflow_id", post(handlers::webhooks::workflow_webhook))
        .route("/webhooks/github", post(handlers::webhooks::github))
        .route("/webhooks/slack/events", post(handlers::webhooks::slack_events))
        .route("/webhooks/slack/commands", post(handlers::webhooks::slack_commands));

    let app = Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .nest("/api/v1", workflow_router)
        .merge(webhook_router)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
