use std::{collections::HashMap, fmt, sync::Arc};

use axum::http::HeaderMap;
use serde_json::{Value, json};

use crate::{
    auth::{AuthPolicy, Principal},
    config::AppConfig,
    envelope::{ApiResponse, FAILURE_ERRCODE},
    error::ApiError,
    hooks::{Action, BeforeAction, run_before_actions},
    models::{FilterMap, ListQuery, Record, SoftDelete, SoftDeleteRule},
    query::ListParams,
    repository::{RepositoryError, RepositoryState},
};

// --- Response messages ---

pub const MSG_LISTED: &str = "fetched successfully";
pub const MSG_NO_DATA: &str = "no data";
pub const MSG_CREATED: &str = "created successfully";
pub const MSG_READ: &str = "query succeeded";
pub const MSG_UPDATED: &str = "updated successfully";
pub const MSG_UPDATE_FAILED: &str = "update failed";
pub const MSG_NOTHING_TO_UPDATE: &str = "no updatable fields";
pub const MSG_DELETED: &str = "deleted successfully";
pub const MSG_ALREADY_DELETED: &str = "already deleted";
pub const MSG_NOT_FOUND: &str = "record not found";
pub const MSG_ID_ERROR: &str = "id error";

/// RequestContext
///
/// Per-request state handed through the controller chain: what is being done,
/// on which resource, and by whom (when the controller's policy authenticates).
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub action: Action,
    pub resource: String,
    pub principal: Option<Principal>,
}

// --- Registries ---

/// ModelRegistry
///
/// Models addressable by name. The route's `{resource}` segment is looked up here
/// when a controller does not resolve its own model.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, RepositoryState>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `repo` under its table name, replacing any earlier entry.
    pub fn register(&mut self, repo: RepositoryState) {
        self.models.insert(repo.table().to_string(), repo);
    }

    pub fn with(mut self, repo: RepositoryState) -> Self {
        self.register(repo);
        self
    }

    pub fn get(&self, name: &str) -> Option<RepositoryState> {
        self.models.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

}

/// ControllerRegistry
///
/// Explicitly configured controllers, keyed by resource name. A resource with a
/// registered model but no controller gets a plain controller using the default policy.
#[derive(Clone)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<ResourceController>>,
    default_policy: AuthPolicy,
}

impl ControllerRegistry {
    pub fn new(default_policy: AuthPolicy) -> Self {
        Self {
            controllers: HashMap::new(),
            default_policy,
        }
    }

    pub fn register(&mut self, controller: ResourceController) {
        self.controllers
            .insert(controller.resource.clone(), Arc::new(controller));
    }

    pub fn with(mut self, controller: ResourceController) -> Self {
        self.register(controller);
        self
    }

    /// The controller serving `resource`, or `None` if neither a controller nor a model exists.
    pub fn resolve(&self, resource: &str, models: &ModelRegistry) -> Option<Arc<ResourceController>> {
        if let Some(controller) = self.controllers.get(resource) {
            return Some(controller.clone());
        }
        models
            .contains(resource)
            .then(|| Arc::new(ResourceController::new(resource, self.default_policy)))
    }
}

// --- Hook slots ---

pub type ModelResolver = Arc<dyn Fn(&ModelRegistry) -> Option<RepositoryState> + Send + Sync>;
pub type FilterHook =
    Arc<dyn Fn(&RequestContext, &mut FilterMap) -> Result<(), ApiError> + Send + Sync>;
pub type ParamsHook =
    Arc<dyn Fn(&RequestContext, &mut Record) -> Result<(), ApiError> + Send + Sync>;

/// A posted body, or the envelope explaining why it could not be read.
/// Rejections are only surfaced once the gate has passed.
pub type PostedBody = Result<Record, ApiResponse>;

/// CrudRequest
///
/// One dispatched operation together with its raw inputs.
#[derive(Debug, Clone)]
pub enum CrudRequest {
    Index(HashMap<String, String>),
    Save(PostedBody),
    Read(String),
    Update(String, PostedBody),
    Delete(String),
}

impl CrudRequest {
    pub fn action(&self) -> Action {
        match self {
            CrudRequest::Index(_) => Action::Index,
            CrudRequest::Save(_) => Action::Save,
            CrudRequest::Read(_) => Action::Read,
            CrudRequest::Update(..) => Action::Update,
            CrudRequest::Delete(_) => Action::Delete,
        }
    }
}

/// ResourceController
///
/// The generic CRUD controller for one resource. Behaviour is customised through
/// explicit slots set at construction time:
/// - `policy`: the auth gate run before anything else,
/// - `before_actions`: named hooks with `only`/`except` selectors,
/// - model resolvers (per action, then controller-wide, then by resource name),
/// - parameter filters for list, create and update.
pub struct ResourceController {
    resource: String,
    policy: AuthPolicy,
    before_actions: Vec<BeforeAction>,
    model: Option<ModelResolver>,
    action_models: HashMap<Action, ModelResolver>,
    list_filter: Option<FilterHook>,
    save_filter: Option<ParamsHook>,
    update_filter: Option<ParamsHook>,
    soft_delete: SoftDeleteRule,
}

impl fmt::Debug for ResourceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceController")
            .field("resource", &self.resource)
            .field("policy", &self.policy)
            .field("before_actions", &self.before_actions)
            .field("soft_delete", &self.soft_delete)
            .finish_non_exhaustive()
    }
}

impl ResourceController {
    pub fn new(resource: impl Into<String>, policy: AuthPolicy) -> Self {
        Self {
            resource: resource.into(),
            policy,
            before_actions: Vec::new(),
            model: None,
            action_models: HashMap::new(),
            list_filter: None,
            save_filter: None,
            update_filter: None,
            soft_delete: SoftDeleteRule::default(),
        }
    }

    pub fn before_action(mut self, hook: BeforeAction) -> Self {
        self.before_actions.push(hook);
        self
    }

    /// Resolves the model for every action that has no per-action resolver.
    pub fn model<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&ModelRegistry) -> Option<RepositoryState> + Send + Sync + 'static,
    {
        self.model = Some(Arc::new(resolver));
        self
    }

    pub fn action_model<F>(mut self, action: Action, resolver: F) -> Self
    where
        F: Fn(&ModelRegistry) -> Option<RepositoryState> + Send + Sync + 'static,
    {
        self.action_models.insert(action, Arc::new(resolver));
        self
    }

    /// Edits the equality filter map of list requests after it is built.
    /// An error aborts the request.
    pub fn list_filter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &mut FilterMap) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.list_filter = Some(Arc::new(hook));
        self
    }

    /// Transforms create payloads before insert; an error rejects the payload.
    pub fn save_filter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &mut Record) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.save_filter = Some(Arc::new(hook));
        self
    }

    /// Transforms update payloads before they are applied; an error rejects the payload.
    pub fn update_filter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &mut Record) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.update_filter = Some(Arc::new(hook));
        self
    }

    pub fn soft_delete_with(mut self, field: impl Into<String>, sentinel: i64) -> Self {
        self.soft_delete = SoftDeleteRule {
            field: field.into(),
            sentinel,
        };
        self
    }

    /// initialize
    ///
    /// Runs the controller's auth gate, then its before-action hooks, producing the
    /// context the operation runs with.
    pub fn initialize(
        &self,
        action: Action,
        headers: &HeaderMap,
        config: &AppConfig,
    ) -> Result<RequestContext, ApiError> {
        let principal = self.policy.gate(headers, config).map_err(|e| {
            tracing::warn!(resource = %self.resource, %action, "auth gate rejected request: {}", e);
            e
        })?;

        let ctx = RequestContext {
            action,
            resource: self.resource.clone(),
            principal,
        };
        run_before_actions(&self.before_actions, &ctx)?;
        Ok(ctx)
    }

    /// Per-action resolver, then the controller-wide one, then the registry entry named
    /// after the resource.
    pub fn resolve_model(
        &self,
        action: Action,
        models: &ModelRegistry,
    ) -> Result<RepositoryState, ApiError> {
        let resolved = match (self.action_models.get(&action), &self.model) {
            (Some(resolver), _) => resolver(models),
            (None, Some(resolver)) => resolver(models),
            (None, None) => models.get(&self.resource),
        };
        resolved.ok_or_else(|| ApiError::NotFound(format!("model `{}` not found", self.resource)))
    }

    /// dispatch
    ///
    /// Full request lifecycle: initialise, run the operation, and fold every failure
    /// into an envelope. Body rejections surface only after the gate has passed.
    pub async fn dispatch(
        &self,
        request: CrudRequest,
        headers: &HeaderMap,
        models: &ModelRegistry,
        config: &AppConfig,
    ) -> ApiResponse {
        let action = request.action();
        tracing::debug!(resource = %self.resource, %action, "dispatching");

        let result = match self.initialize(action, headers, config) {
            Ok(ctx) => match request {
                CrudRequest::Index(params) => self.index(&ctx, models, params, config).await,
                CrudRequest::Save(Ok(params)) => self.save(&ctx, models, params).await,
                CrudRequest::Read(id) => self.read(&ctx, models, &id).await,
                CrudRequest::Update(id, Ok(params)) => {
                    self.update(&ctx, models, &id, params).await
                }
                CrudRequest::Save(Err(rejection)) | CrudRequest::Update(_, Err(rejection)) => {
                    Ok(rejection)
                }
                CrudRequest::Delete(id) => self.delete(&ctx, models, &id).await,
            },
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| ApiResponse::from_error(e, &config.api_codes))
    }

    // --- Operations ---

    /// index
    ///
    /// Lists rows matching the equality filters, with optional ordering, projection
    /// and pagination. An empty result is reported as an error envelope.
    pub async fn index(
        &self,
        ctx: &RequestContext,
        models: &ModelRegistry,
        params: HashMap<String, String>,
        config: &AppConfig,
    ) -> Result<ApiResponse, ApiError> {
        let model = self.resolve_model(Action::Index, models)?;
        let known = model.fields().await.map_err(|e| self.failed(ctx, e))?;

        let mut query = ListQuery::build(ListParams::from_map(params), &known, config.default_page_size)
            .map_err(ApiError::operation)?;
        if let Some(hook) = &self.list_filter {
            hook(ctx, &mut query.filters)?;
        }

        let rows = model.select(&query).await.map_err(|e| self.failed(ctx, e))?;
        if rows.is_empty() {
            return Ok(ApiResponse::error(MSG_NO_DATA, FAILURE_ERRCODE));
        }
        Ok(ApiResponse::success(
            MSG_LISTED,
            Value::Array(rows.into_iter().map(Value::Object).collect()),
        ))
    }

    /// save
    ///
    /// Inserts the posted params (after the save filter) and returns the new id.
    pub async fn save(
        &self,
        ctx: &RequestContext,
        models: &ModelRegistry,
        mut params: Record,
    ) -> Result<ApiResponse, ApiError> {
        let model = self.resolve_model(Action::Save, models)?;
        if let Some(hook) = &self.save_filter {
            hook(ctx, &mut params)?;
        }
        let id = model.insert(params).await.map_err(|e| self.failed(ctx, e))?;
        Ok(ApiResponse::success(MSG_CREATED, json!({ "id": id })))
    }

    pub async fn read(
        &self,
        ctx: &RequestContext,
        models: &ModelRegistry,
        raw_id: &str,
    ) -> Result<ApiResponse, ApiError> {
        let id = parse_id(raw_id)?;
        let model = self.resolve_model(Action::Read, models)?;
        match model.find(id).await.map_err(|e| self.failed(ctx, e))? {
            Some(record) => Ok(ApiResponse::success(MSG_READ, Value::Object(record))),
            None => Ok(ApiResponse::error(MSG_NOT_FOUND, FAILURE_ERRCODE)),
        }
    }

    /// update
    ///
    /// Applies the update filter, keeps only known non-key fields and updates by id.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        models: &ModelRegistry,
        raw_id: &str,
        mut params: Record,
    ) -> Result<ApiResponse, ApiError> {
        let id = parse_id(raw_id)?;
        let model = self.resolve_model(Action::Update, models)?;
        if let Some(hook) = &self.update_filter {
            hook(ctx, &mut params)?;
        }

        let known = model.fields().await.map_err(|e| self.failed(ctx, e))?;
        params.retain(|key, _| key != "id" && known.contains(key));
        if params.is_empty() {
            return Ok(ApiResponse::error(MSG_NOTHING_TO_UPDATE, FAILURE_ERRCODE));
        }

        let affected = model.update(id, params).await.map_err(|e| self.failed(ctx, e))?;
        if affected > 0 {
            Ok(ApiResponse::success(MSG_UPDATED, json!({ "id": id })))
        } else {
            Ok(ApiResponse::error(MSG_UPDATE_FAILED, FAILURE_ERRCODE))
        }
    }

    /// delete
    ///
    /// Soft delete. The id is validated before any model is touched.
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        models: &ModelRegistry,
        raw_id: &str,
    ) -> Result<ApiResponse, ApiError> {
        let id = parse_id(raw_id)?;
        let model = self.resolve_model(Action::Delete, models)?;
        let rule = &self.soft_delete;

        match model
            .soft_delete(id, &rule.field, rule.sentinel)
            .await
            .map_err(|e| self.failed(ctx, e))?
        {
            SoftDelete::Deleted => Ok(ApiResponse::success(MSG_DELETED, json!({ "id": id }))),
            SoftDelete::AlreadyDeleted => {
                Ok(ApiResponse::success(MSG_ALREADY_DELETED, json!({ "id": id })))
            }
            SoftDelete::NotFound => Ok(ApiResponse::error(MSG_NOT_FOUND, FAILURE_ERRCODE)),
        }
    }

    fn failed(&self, ctx: &RequestContext, err: RepositoryError) -> ApiError {
        tracing::error!(resource = %self.resource, action = %ctx.action, "operation failed: {}", err);
        ApiError::operation(err)
    }
}

/// Primary keys must be positive integers.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::Operation(MSG_ID_ERROR.to_string()))
}
