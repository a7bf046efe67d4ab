//! Deployment management (C4) — the deploy/undeploy/update/pause/resume
//! state machine over a workflow's `trigger_index` registrations.
//!
//! Every mutation for a given workflow is serialized behind a per-workflow
//! lock (a `DashMap<Uuid, Arc<Mutex<()>>>`) so concurrent deploy/undeploy
//! calls against the same workflow can't race each other into an
//! inconsistent `trigger_index`. A failed partial registration rolls back:
//! any rows already inserted are removed and the workflow's status is put
//! back where it started, with the failure recorded in `deployment_history`.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use engine::Workflow;

use crate::error::SchedulerError;
use crate::index;
use crate::models::{DeploymentOutcome, DeploymentStatus, TriggerSpec, TriggerType};
use crate::oauth::OAuthTokenStore;

/// Deploy-time Slack channel-name -> channel-id resolution (spec.md
/// §4.4.2 step 3: `conversations.list`, paginated to 1000 per page).
/// Kept as a narrow trait so tests can supply a fake without a live
/// Slack token.
#[async_trait::async_trait]
pub trait SlackChannelResolver: Send + Sync {
    /// Returns every `(name, id)` pair visible to the bot token, across
    /// all pages.
    async fn list_channels(&self, access_token: &str) -> Result<Vec<(String, String)>, SchedulerError>;
}

/// Real `conversations.list` client, paginated via `response_metadata.next_cursor`.
pub struct SlackConversationsListResolver {
    http: reqwest::Client,
}

impl SlackConversationsListResolver {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl SlackChannelResolver for SlackConversationsListResolver {
    async fn list_channels(&self, access_token: &str) -> Result<Vec<(String, String)>, SchedulerError> {
        let mut out = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut req = self
                .http
                .get("https://slack.com/api/conversations.list")
                .bearer_auth(access_token)
                .query(&[("limit", "1000")]);
            if !cursor.is_empty() {
                req = req.query(&[("cursor", cursor.as_str())]);
            }

            let body: Value = req
                .send()
                .await
                .map_err(|e| SchedulerError::ProviderResolution(e.to_string()))?
                .json()
                .await
                .map_err(|e| SchedulerError::ProviderResolution(e.to_string()))?;

            if body.get("ok").and_then(Value::as_bool) == Some(false) {
                let err = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
                return Err(SchedulerError::ProviderResolution(format!("slack conversations.list: {err}")));
            }

            let channels = body.get("channels").and_then(Value::as_array).cloned().unwrap_or_default();
            for ch in &channels {
                if let (Some(name), Some(id)) = (ch.get("name").and_then(Value::as_str), ch.get("id").and_then(Value::as_str)) {
                    out.push((name.to_string(), id.to_string()));
                }
            }

            cursor = body
                .get("response_metadata")
                .and_then(|m| m.get("next_cursor"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            if cursor.is_empty() {
                break;
            }
        }

        Ok(out)
    }
}

fn resolve_channel_name<'a>(name: &str, resolved: &'a [(String, String)]) -> Option<&'a str> {
    resolved.iter().find(|(n, _)| n == name).map(|(_, id)| id.as_str())
}

/// Rewrite a Slack trigger's channel fields in place, replacing any name
/// that resolves against `resolved` with its channel id. A name that
/// cannot be resolved is passed through verbatim (spec.md §4.4.2 step 3)
/// with a warning logged by the caller.
fn apply_channel_resolution(config: &mut serde_json::Map<String, Value>, resolved: &[(String, String)]) {
    if let Some(Value::Array(channels)) = config.get_mut("channels") {
        for entry in channels.iter_mut() {
            if let Some(name) = entry.as_str() {
                if let Some(id) = resolve_channel_name(name, resolved) {
                    *entry = Value::String(id.to_string());
                } else {
                    tracing::warn!(channel = name, "slack channel name could not be resolved to an id");
                }
            }
        }
        return;
    }

    if let Some(Value::String(filter)) = config.get("channel_filter") {
        let rewritten: Vec<String> = filter
            .split(',')
            .map(str::trim)
            .map(|name| {
                resolve_channel_name(name, resolved)
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        tracing::warn!(channel = name, "slack channel name could not be resolved to an id");
                        name.to_string()
                    })
            })
            .collect();
        config.insert("channel_filter".to_string(), Value::String(rewritten.join(",")));
    }
}

/// Merge `owner_id`'s stored GitHub/Slack credential into matching trigger
/// specs' `trigger_config`. Missing credential and lookup errors are both
/// silently skipped — a workflow still deploys without resolved context,
/// it just can't call out on whatever provider wasn't resolved.
async fn resolve_provider_context(
    store: &dyn OAuthTokenStore,
    channels: Option<&dyn SlackChannelResolver>,
    owner_id: Uuid,
    specs: &mut [TriggerSpec],
) {
    for spec in specs.iter_mut() {
        let provider = match spec.trigger_type {
            TriggerType::Github => "github",
            TriggerType::Slack => "slack",
            _ => continue,
        };

        let token = match store.get_token(owner_id, provider).await {
            Ok(Some(token)) => token,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(owner_id = %owner_id, provider, error = %e, "failed to resolve oauth credential");
                continue;
            }
        };

        let Some(obj) = spec.trigger_config.as_object_mut() else { continue };

        match spec.trigger_type {
            TriggerType::Github => {
                // Log-only failure per spec.md §4.4.2 step 3 — the trigger
                // still registers even if no installation id is on file.
                match token.credential_data.get("installation_id").cloned() {
                    Some(id) => {
                        obj.insert("github_app_installation_id".to_string(), id);
                    }
                    None => tracing::warn!(owner_id = %owner_id, "github credential has no installation_id"),
                }
            }
            TriggerType::Slack => {
                // Always overwrite with the resolved team id, ignoring any
                // user-provided `workspace_id` (spec.md §4.4.2 step 3).
                if let Some(team_id) = token.credential_data.get("team_id").cloned() {
                    obj.insert("workspace_id".to_string(), team_id);
                }

                if let Some(resolver) = channels {
                    match resolver.list_channels(&token.access_token).await {
                        Ok(resolved) => apply_channel_resolution(obj, &resolved),
                        Err(e) => tracing::warn!(owner_id = %owner_id, error = %e, "slack channel resolution failed"),
                    }
                }
            }
            _ => {}
        }
    }
}

/// C1's register/unregister half, abstracted so `deploy_inner`/`undeploy`
/// can be driven by an in-memory fake in tests instead of a live
/// Postgres `trigger_index` table.
#[async_trait::async_trait]
pub trait TriggerIndexStore: Send + Sync {
    async fn register(&self, workflow_id: Uuid, specs: &[TriggerSpec]) -> Result<(), SchedulerError>;
    async fn unregister(&self, workflow_id: Uuid) -> Result<(), SchedulerError>;
}

/// Production `TriggerIndexStore`, backed by the `trigger_index` table.
pub struct PgTriggerIndexStore {
    pool: db::DbPool,
}

impl PgTriggerIndexStore {
    pub fn new(pool: db::DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TriggerIndexStore for PgTriggerIndexStore {
    async fn register(&self, workflow_id: Uuid, specs: &[TriggerSpec]) -> Result<(), SchedulerError> {
        index::register(&self.pool, workflow_id, specs).await.map_err(Into::into)
    }

    async fn unregister(&self, workflow_id: Uuid) -> Result<(), SchedulerError> {
        index::unregister(&self.pool, workflow_id).await.map_err(Into::into)
    }
}

/// Register a workflow's trigger specs in C1 and C3 in parallel
/// (spec.md:158): if either fails, undo the other so a workflow never
/// ends up registered on only one side.
async fn register_in_c1_and_c3(
    index: &dyn TriggerIndexStore,
    dispatch: &dyn crate::dispatch::TriggerDispatchRegistry,
    workflow_id: Uuid,
    specs: &[TriggerSpec],
) -> Result<(), SchedulerError> {
    let (c1, c3) = tokio::join!(index.register(workflow_id, specs), dispatch.register(workflow_id, specs));

    match (c1, c3) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(e)) => {
            let _ = index.unregister(workflow_id).await;
            Err(e)
        }
        (Err(e), Ok(())) => {
            let _ = dispatch.unregister(workflow_id).await;
            Err(e)
        }
        (Err(e), Err(_)) => Err(e),
    }
}

/// Unregister a workflow from C1 and C3 in parallel (spec.md:164).
async fn unregister_from_c1_and_c3(
    index: &dyn TriggerIndexStore,
    dispatch: &dyn crate::dispatch::TriggerDispatchRegistry,
    workflow_id: Uuid,
) -> Result<(), SchedulerError> {
    let (c1, c3) = tokio::join!(index.unregister(workflow_id), dispatch.unregister(workflow_id));
    c1.and(c3)
}

pub struct DeploymentManager {
    pool: db::DbPool,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    oauth: Option<Arc<dyn OAuthTokenStore>>,
    channels: Option<Arc<dyn SlackChannelResolver>>,
    index: Arc<dyn TriggerIndexStore>,
    dispatch: Arc<dyn crate::dispatch::TriggerDispatchRegistry>,
}

impl DeploymentManager {
    pub fn new(pool: db::DbPool) -> Self {
        let index = Arc::new(PgTriggerIndexStore::new(pool.clone()));
        Self {
            pool,
            locks: DashMap::new(),
            oauth: None,
            channels: None,
            index,
            dispatch: Arc::new(crate::dispatch::CronScheduleRegistry::new()),
        }
    }

    /// Attach an `OAuthTokenStore` so `deploy_for_owner` can resolve
    /// provider credentials into trigger specs.
    pub fn with_oauth_store(mut self, store: Arc<dyn OAuthTokenStore>) -> Self {
        self.oauth = Some(store);
        self
    }

    /// Attach a Slack channel-name resolver so `deploy_for_owner` can turn
    /// `channels: ["general"]`/`channel_filter: "general,hil"` into ids.
    pub fn with_channel_resolver(mut self, resolver: Arc<dyn SlackChannelResolver>) -> Self {
        self.channels = Some(resolver);
        self
    }

    /// Override the C1 store (tests only need this to inject a fake).
    pub fn with_index_store(mut self, index: Arc<dyn TriggerIndexStore>) -> Self {
        self.index = index;
        self
    }

    /// Override the C3 dispatcher registry, e.g. with a fake in tests, or
    /// with a registry wired to real webhook/Slack dispatchers in
    /// deployments beyond the built-in cron schedule cache.
    pub fn with_dispatch_registry(mut self, dispatch: Arc<dyn crate::dispatch::TriggerDispatchRegistry>) -> Self {
        self.dispatch = dispatch;
        self
    }

    fn lock_for(&self, workflow_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(workflow_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Parse a workflow row's `definition` JSON into the engine's domain
    /// `Workflow` type.
    fn parse_definition(definition: &serde_json::Value) -> Result<Workflow, SchedulerError> {
        serde_json::from_value(definition.clone()).map_err(|e| SchedulerError::InvalidDefinition(e.to_string()))
    }

    /// Deploy a workflow: validate its graph, extract and register its
    /// trigger specs, and flip its status to `DEPLOYED`.
    pub async fn deploy(&self, workflow_id: Uuid) -> Result<DeploymentOutcome, SchedulerError> {
        self.deploy_inner(workflow_id, None).await
    }

    /// Same as [`deploy`](Self::deploy), but resolves `owner_id`'s stored
    /// GitHub/Slack credentials into the GITHUB/SLACK trigger specs before
    /// registering them (mirrors the original platform's deploy-time
    /// installation id / workspace token resolution). No-op per trigger
    /// when no store is attached or no credential is on file.
    pub async fn deploy_for_owner(&self, workflow_id: Uuid, owner_id: Uuid) -> Result<DeploymentOutcome, SchedulerError> {
        self.deploy_inner(workflow_id, Some(owner_id)).await
    }

    async fn deploy_inner(&self, workflow_id: Uuid, owner_id: Option<Uuid>) -> Result<DeploymentOutcome, SchedulerError> {
        let _guard = self.lock_for(workflow_id).lock_owned().await;

        let row = db::repository::workflows::get_workflow(&self.pool, workflow_id).await?;
        if row.deployment_status == DeploymentStatus::Deployed.as_str() {
            return Err(SchedulerError::AlreadyDeployed(workflow_id));
        }

        let workflow = Self::parse_definition(&row.definition)?;
        engine::schedulable_levels(&workflow)?;

        let mut specs = index::extract_trigger_specs(&workflow);
        if let (Some(owner_id), Some(store)) = (owner_id, &self.oauth) {
            let resolver = self.channels.as_deref();
            resolve_provider_context(store.as_ref(), resolver, owner_id, &mut specs).await;
        }

        // spec.md:149 — pass through DEPLOYING before settling into
        // DEPLOYED/DEPLOYMENT_FAILED, so a concurrent reader never sees a
        // workflow jump straight from UNDEPLOYED to DEPLOYED.
        db::repository::workflows::set_deployment_status(
            &self.pool,
            workflow_id,
            DeploymentStatus::Deploying.as_str(),
            row.deployment_version,
            None,
            None,
        )
        .await?;

        if let Err(e) = register_in_c1_and_c3(self.index.as_ref(), self.dispatch.as_ref(), workflow_id, &specs).await {
            self.record_failure(workflow_id, "DEPLOY_FAILED", DeploymentStatus::Deploying.as_str(), &e.to_string(), row.deployment_version)
                .await;
            return Err(e);
        }

        let new_version = row.deployment_version + 1;
        let now = chrono::Utc::now();
        db::repository::workflows::set_deployment_status(
            &self.pool,
            workflow_id,
            DeploymentStatus::Deployed.as_str(),
            new_version,
            Some(now),
            None,
        )
        .await?;

        db::repository::deployment_history::append(
            &self.pool,
            workflow_id,
            "DEPLOY",
            &row.deployment_status,
            DeploymentStatus::Deployed.as_str(),
            new_version,
            None,
            row.definition.clone(),
        )
        .await?;

        Ok(DeploymentOutcome {
            workflow_id,
            status: DeploymentStatus::Deployed,
            deployment_version: new_version,
            trigger_count: specs.len(),
            trigger_index_status: None,
        })
    }

    /// Undeploy a workflow: remove its trigger registrations and flip its
    /// status to `UNDEPLOYED` (spec.md §4.4.3).
    pub async fn undeploy(&self, workflow_id: Uuid) -> Result<DeploymentOutcome, SchedulerError> {
        let _guard = self.lock_for(workflow_id).lock_owned().await;

        let row = db::repository::workflows::get_workflow(&self.pool, workflow_id).await?;
        if row.deployment_status == DeploymentStatus::Undeployed.as_str() {
            return Err(SchedulerError::NotDeployed(workflow_id));
        }

        db::repository::workflows::set_deployment_status(
            &self.pool,
            workflow_id,
            DeploymentStatus::Deploying.as_str(),
            row.deployment_version,
            None,
            None,
        )
        .await?;
        db::repository::deployment_history::append(
            &self.pool,
            workflow_id,
            "UNDEPLOY_STARTED",
            &row.deployment_status,
            DeploymentStatus::Deploying.as_str(),
            row.deployment_version,
            None,
            serde_json::Value::Null,
        )
        .await?;

        if let Err(e) = unregister_from_c1_and_c3(self.index.as_ref(), self.dispatch.as_ref(), workflow_id).await {
            self.record_failure(workflow_id, "UNDEPLOY_FAILED", DeploymentStatus::Deploying.as_str(), &e.to_string(), row.deployment_version)
                .await;
            return Err(e);
        }

        let now = chrono::Utc::now();
        db::repository::workflows::set_deployment_status(
            &self.pool,
            workflow_id,
            DeploymentStatus::Undeployed.as_str(),
            row.deployment_version,
            None,
            Some(now),
        )
        .await?;

        db::repository::deployment_history::append(
            &self.pool,
            workflow_id,
            "UNDEPLOY_COMPLETED",
            DeploymentStatus::Deploying.as_str(),
            DeploymentStatus::Undeployed.as_str(),
            row.deployment_version,
            None,
            serde_json::Value::Null,
        )
        .await?;

        Ok(DeploymentOutcome {
            workflow_id,
            status: DeploymentStatus::Undeployed,
            deployment_version: row.deployment_version,
            trigger_count: 0,
            trigger_index_status: None,
        })
    }

    /// Pause a deployed workflow — its triggers stop matching without
    /// losing their registration (distinct from `undeploy`, which removes
    /// them entirely). Unlike `undeploy`, this never touches the
    /// workflow's own `deployment_status`: spec.md:149 models pause/resume
    /// purely as a `trigger_index.deployment_status` flip, so the
    /// workflow stays `DEPLOYED` the whole time it's paused.
    pub async fn pause(&self, workflow_id: Uuid) -> Result<DeploymentOutcome, SchedulerError> {
        let _guard = self.lock_for(workflow_id).lock_owned().await;
        self.set_trigger_status(workflow_id, "inactive", "PAUSE").await
    }

    /// Resume a paused workflow's triggers.
    pub async fn resume(&self, workflow_id: Uuid) -> Result<DeploymentOutcome, SchedulerError> {
        let _guard = self.lock_for(workflow_id).lock_owned().await;
        self.set_trigger_status(workflow_id, "active", "RESUME").await
    }

    async fn set_trigger_status(
        &self,
        workflow_id: Uuid,
        index_status: &'static str,
        history_action: &'static str,
    ) -> Result<DeploymentOutcome, SchedulerError> {
        let row = db::repository::workflows::get_workflow(&self.pool, workflow_id).await?;
        if row.deployment_status != DeploymentStatus::Deployed.as_str() {
            return Err(SchedulerError::NotDeployed(workflow_id));
        }

        db::repository::trigger_index::update_status(&self.pool, workflow_id, index_status).await?;

        db::repository::deployment_history::append(
            &self.pool,
            workflow_id,
            history_action,
            DeploymentStatus::Deployed.as_str(),
            DeploymentStatus::Deployed.as_str(),
            row.deployment_version,
            None,
            serde_json::Value::Null,
        )
        .await?;

        Ok(DeploymentOutcome {
            workflow_id,
            status: DeploymentStatus::Deployed,
            deployment_version: row.deployment_version,
            trigger_count: 0,
            trigger_index_status: Some(index_status),
        })
    }

    /// Replace a deployed workflow's definition in place: undeploy the old
    /// triggers, persist the new definition, and deploy the new ones.
    pub async fn update(&self, workflow_id: Uuid, new_definition: serde_json::Value) -> Result<DeploymentOutcome, SchedulerError> {
        let _guard = self.lock_for(workflow_id).lock_owned().await;

        let row = db::repository::workflows::get_workflow(&self.pool, workflow_id).await?;
        let was_deployed = row.deployment_status == DeploymentStatus::Deployed.as_str();

        if was_deployed {
            unregister_from_c1_and_c3(self.index.as_ref(), self.dispatch.as_ref(), workflow_id).await?;
        }

        db::repository::workflows::update_definition(&self.pool, workflow_id, new_definition.clone()).await?;

        if !was_deployed {
            return Ok(DeploymentOutcome {
                workflow_id,
                status: DeploymentStatus::Undeployed,
                deployment_version: row.deployment_version,
                trigger_count: 0,
                trigger_index_status: None,
            });
        }

        let workflow = Self::parse_definition(&new_definition)?;
        engine::schedulable_levels(&workflow)?;
        let specs = index::extract_trigger_specs(&workflow);

        if let Err(e) = register_in_c1_and_c3(self.index.as_ref(), self.dispatch.as_ref(), workflow_id, &specs).await {
            self.record_failure(workflow_id, "UPDATE_FAILED", DeploymentStatus::Deployed.as_str(), &e.to_string(), row.deployment_version)
                .await;
            return Err(e);
        }

        let new_version = row.deployment_version + 1;
        db::repository::workflows::set_deployment_status(
            &self.pool,
            workflow_id,
            DeploymentStatus::Deployed.as_str(),
            new_version,
            None,
            None,
        )
        .await?;

        db::repository::deployment_history::append(
            &self.pool,
            workflow_id,
            "UPDATE",
            DeploymentStatus::Deployed.as_str(),
            DeploymentStatus::Deployed.as_str(),
            new_version,
            None,
            new_definition,
        )
        .await?;

        Ok(DeploymentOutcome {
            workflow_id,
            status: DeploymentStatus::Deployed,
            deployment_version: new_version,
            trigger_count: specs.len(),
            trigger_index_status: None,
        })
    }

    /// Roll back both registries and transition the workflow to
    /// `DEPLOYMENT_FAILED` (spec.md:158, Testable Scenario 5).
    async fn record_failure(&self, workflow_id: Uuid, action: &str, from_status: &str, error: &str, deployment_version: i32) {
        let _ = unregister_from_c1_and_c3(self.index.as_ref(), self.dispatch.as_ref(), workflow_id).await;
        let _ = db::repository::workflows::set_deployment_status(
            &self.pool,
            workflow_id,
            DeploymentStatus::DeploymentFailed.as_str(),
            deployment_version,
            None,
            None,
        )
        .await;
        let _ = db::repository::deployment_history::append(
            &self.pool,
            workflow_id,
            action,
            from_status,
            DeploymentStatus::DeploymentFailed.as_str(),
            deployment_version,
            Some(error),
            serde_json::Value::Null,
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::OAuthToken;
    use serde_json::json;

    struct FakeStore {
        token: Option<OAuthToken>,
    }

    #[async_trait::async_trait]
    impl OAuthTokenStore for FakeStore {
        async fn get_token(&self, _owner_id: Uuid, _provider: &str) -> Result<Option<OAuthToken>, SchedulerError> {
            Ok(self.token.clone())
        }
    }

    fn spec(trigger_type: TriggerType) -> TriggerSpec {
        TriggerSpec { trigger_type, index_key: String::new(), trigger_config: json!({}) }
    }

    struct FakeChannels {
        pairs: Vec<(String, String)>,
    }

    #[async_trait::async_trait]
    impl SlackChannelResolver for FakeChannels {
        async fn list_channels(&self, _access_token: &str) -> Result<Vec<(String, String)>, SchedulerError> {
            Ok(self.pairs.clone())
        }
    }

    #[tokio::test]
    async fn github_credential_sets_installation_id_field() {
        let store = FakeStore {
            token: Some(OAuthToken {
                access_token: "ghs_abc".to_string(),
                credential_data: json!({"installation_id": 42}),
            }),
        };

        let mut specs = vec![spec(TriggerType::Github), spec(TriggerType::Webhook)];
        resolve_provider_context(&store, None, Uuid::new_v4(), &mut specs).await;

        assert_eq!(specs[0].trigger_config["github_app_installation_id"], json!(42));
        assert_eq!(specs[1].trigger_config, json!({}), "non-github/slack specs are untouched");
    }

    #[tokio::test]
    async fn missing_credential_leaves_trigger_config_untouched() {
        let store = FakeStore { token: None };
        let mut specs = vec![spec(TriggerType::Slack)];
        resolve_provider_context(&store, None, Uuid::new_v4(), &mut specs).await;
        assert_eq!(specs[0].trigger_config, json!({}));
    }

    #[tokio::test]
    async fn slack_credential_always_overwrites_workspace_id() {
        let store = FakeStore {
            token: Some(OAuthToken {
                access_token: "xoxb-1".to_string(),
                credential_data: json!({"team_id": "T999"}),
            }),
        };
        let mut specs = vec![spec(TriggerType::Slack)];
        specs[0].trigger_config = json!({"workspace_id": "user-provided-wrong-id"});

        resolve_provider_context(&store, None, Uuid::new_v4(), &mut specs).await;

        assert_eq!(specs[0].trigger_config["workspace_id"], json!("T999"));
    }

    #[tokio::test]
    async fn slack_channel_names_resolve_to_ids_in_channels_array() {
        let store = FakeStore {
            token: Some(OAuthToken { access_token: "xoxb-1".to_string(), credential_data: json!({"team_id": "T1"}) }),
        };
        let channels = FakeChannels { pairs: vec![("general".to_string(), "C09D2JW6814".to_string())] };

        let mut specs = vec![spec(TriggerType::Slack)];
        specs[0].trigger_config = json!({"channels": ["general"]});

        resolve_provider_context(&store, Some(&channels), Uuid::new_v4(), &mut specs).await;

        assert_eq!(specs[0].trigger_config["channels"], json!(["C09D2JW6814"]));
    }

    #[tokio::test]
    async fn slack_channel_filter_string_resolves_each_comma_separated_name() {
        let store = FakeStore {
            token: Some(OAuthToken { access_token: "xoxb-1".to_string(), credential_data: json!({"team_id": "T1"}) }),
        };
        let channels = FakeChannels {
            pairs: vec![("general".to_string(), "C1".to_string()), ("hil".to_string(), "C2".to_string())],
        };

        let mut specs = vec![spec(TriggerType::Slack)];
        specs[0].trigger_config = json!({"channel_filter": "general, hil"});

        resolve_provider_context(&store, Some(&channels), Uuid::new_v4(), &mut specs).await;

        assert_eq!(specs[0].trigger_config["channel_filter"], json!("C1,C2"));
    }

    #[tokio::test]
    async fn unresolvable_channel_name_passes_through_verbatim() {
        let store = FakeStore {
            token: Some(OAuthToken { access_token: "xoxb-1".to_string(), credential_data: json!({"team_id": "T1"}) }),
        };
        let channels = FakeChannels { pairs: vec![] };

        let mut specs = vec![spec(TriggerType::Slack)];
        specs[0].trigger_config = json!({"channels": ["unknown-channel"]});

        resolve_provider_context(&store, Some(&channels), Uuid::new_v4(), &mut specs).await;

        assert_eq!(specs[0].trigger_config["channels"], json!(["unknown-channel"]));
    }

    // -- spec.md:158 parallel register/rollback (Testable Scenario 5) --

    struct FakeIndex {
        fail: bool,
        registered: std::sync::Mutex<Vec<Uuid>>,
        unregistered: std::sync::Mutex<Vec<Uuid>>,
    }

    impl FakeIndex {
        fn new(fail: bool) -> Self {
            Self { fail, registered: std::sync::Mutex::new(Vec::new()), unregistered: std::sync::Mutex::new(Vec::new()) }
        }
    }

    #[async_trait::async_trait]
    impl TriggerIndexStore for FakeIndex {
        async fn register(&self, workflow_id: Uuid, _specs: &[TriggerSpec]) -> Result<(), SchedulerError> {
            if self.fail {
                return Err(SchedulerError::ProviderResolution("fake C1 register failure".to_string()));
            }
            self.registered.lock().unwrap().push(workflow_id);
            Ok(())
        }

        async fn unregister(&self, workflow_id: Uuid) -> Result<(), SchedulerError> {
            self.unregistered.lock().unwrap().push(workflow_id);
            Ok(())
        }
    }

    struct FakeDispatch {
        fail: bool,
        registered: std::sync::Mutex<Vec<Uuid>>,
        unregistered: std::sync::Mutex<Vec<Uuid>>,
    }

    impl FakeDispatch {
        fn new(fail: bool) -> Self {
            Self { fail, registered: std::sync::Mutex::new(Vec::new()), unregistered: std::sync::Mutex::new(Vec::new()) }
        }
    }

    #[async_trait::async_trait]
    impl crate::dispatch::TriggerDispatchRegistry for FakeDispatch {
        async fn register(&self, workflow_id: Uuid, _specs: &[TriggerSpec]) -> Result<(), SchedulerError> {
            if self.fail {
                return Err(SchedulerError::DispatcherRegistration("fake C3 register failure".to_string()));
            }
            self.registered.lock().unwrap().push(workflow_id);
            Ok(())
        }

        async fn unregister(&self, workflow_id: Uuid) -> Result<(), SchedulerError> {
            self.unregistered.lock().unwrap().push(workflow_id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn c3_failure_after_successful_c1_register_rolls_back_c1() {
        let index = FakeIndex::new(false);
        let dispatch = FakeDispatch::new(true);
        let workflow_id = Uuid::new_v4();

        let err = register_in_c1_and_c3(&index, &dispatch, workflow_id, &[spec(TriggerType::Cron)]).await;

        assert!(err.is_err(), "the C3 failure must surface to the caller");
        assert_eq!(index.registered.lock().unwrap().as_slice(), &[workflow_id], "C1 register ran");
        assert_eq!(index.unregistered.lock().unwrap().as_slice(), &[workflow_id], "C1 must be rolled back");
    }

    #[tokio::test]
    async fn c1_failure_after_successful_c3_register_rolls_back_c3() {
        let index = FakeIndex::new(true);
        let dispatch = FakeDispatch::new(false);
        let workflow_id = Uuid::new_v4();

        let err = register_in_c1_and_c3(&index, &dispatch, workflow_id, &[spec(TriggerType::Cron)]).await;

        assert!(err.is_err());
        assert_eq!(dispatch.registered.lock().unwrap().as_slice(), &[workflow_id], "C3 register ran");
        assert_eq!(dispatch.unregistered.lock().unwrap().as_slice(), &[workflow_id], "C3 must be rolled back");
    }

    #[tokio::test]
    async fn both_succeeding_leaves_nothing_to_roll_back() {
        let index = FakeIndex::new(false);
        let dispatch = FakeDispatch::new(false);
        let workflow_id = Uuid::new_v4();

        register_in_c1_and_c3(&index, &dispatch, workflow_id, &[spec(TriggerType::Cron)]).await.unwrap();

        assert!(index.unregistered.lock().unwrap().is_empty());
        assert!(dispatch.unregistered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unregister_from_both_runs_in_parallel() {
        let index = FakeIndex::new(false);
        let dispatch = FakeDispatch::new(false);
        let workflow_id = Uuid::new_v4();

        unregister_from_c1_and_c3(&index, &dispatch, workflow_id).await.unwrap();

        assert_eq!(index.unregistered.lock().unwrap().as_slice(), &[workflow_id]);
        assert_eq!(dispatch.unregistered.lock().unwrap().as_slice(), &[workflow_id]);
    }
}
