//! GraphQL API Routes
//!
//! Query, Mutation and Subscription roots over users, projects and tasks.
//!
//! Endpoints:
//! - POST /graphql - execute queries and mutations
//! - GET /graphql - GraphiQL playground
//! - GET /graphql/ws - subscriptions over websocket
//!
//! Every request gets its own [`RequestLoaders`], so relation fields
//! (`Project.owner`, `Project.tasks`, `Task.project`, `Task.assignee`) cost
//! one store round trip per relation and nesting level rather than one per
//! row.

use std::sync::Arc;

use async_graphql::{
    ComplexObject, Context, Enum, ErrorExtensions, InputObject, Object, Result as GqlResult,
    Schema, SimpleObject, Subscription, ID,
};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse, GraphQLSubscription};
use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use futures_util::{Stream, StreamExt};
use taskboard_core::{
    EntityIdType, Project, ProjectId, Role, Task, TaskFilter, TaskId, User, UserId,
};
use taskboard_loader::LoaderConfig;
use taskboard_storage::Store;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{issue_token_pair, AuthConfig, AuthContext},
    error::ApiError,
    events::{EventBus, TaskboardEvent},
    loaders::RequestLoaders,
    middleware::OptionalAuth,
    routes::{projects, tasks, users},
    state::AppState,
    types::{
        CreateProjectRequest, CreateTaskRequest, RegisterRequest, UpdateProjectRequest,
        UpdateTaskRequest,
    },
};

// ============================================================================
// HELPERS
// ============================================================================

fn gql_err(err: impl Into<ApiError>) -> async_graphql::Error {
    err.into().extend()
}

fn parse_id<T: EntityIdType>(id: &ID) -> GqlResult<T> {
    Uuid::parse_str(id.as_str())
        .map(T::new)
        .map_err(|_| ApiError::invalid_format(T::ENTITY_NAME, "UUID").extend())
}

fn require_auth(ctx: &Context<'_>) -> GqlResult<AuthContext> {
    ctx.data_opt::<AuthContext>()
        .copied()
        .ok_or_else(|| ApiError::unauthorized("Authentication required").extend())
}

fn store<'a>(ctx: &Context<'a>) -> GqlResult<&'a Arc<dyn Store>> {
    ctx.data::<Arc<dyn Store>>()
}

/// The request's loaders, or fresh ones when the context carries none.
fn loaders(ctx: &Context<'_>) -> GqlResult<RequestLoaders> {
    if let Some(loaders) = ctx.data_opt::<RequestLoaders>() {
        return Ok(loaders.clone());
    }
    let config = ctx.data::<LoaderConfig>()?;
    Ok(RequestLoaders::new(store(ctx)?.clone(), config.clone()))
}

/// Loaders for a relation field: the ones attached to the parent object
/// (one set per subscription event), else the request's.
fn scoped_loaders(ctx: &Context<'_>, attached: &Option<RequestLoaders>) -> GqlResult<RequestLoaders> {
    match attached {
        Some(loaders) => Ok(loaders.clone()),
        None => loaders(ctx),
    }
}

fn id_of(uuid: impl Into<Uuid>) -> ID {
    ID(uuid.into().to_string())
}

// ============================================================================
// GRAPHQL TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[graphql(name = "Role")]
pub enum GqlRole {
    User,
    Admin,
}

impl From<Role> for GqlRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => GqlRole::User,
            Role::Admin => GqlRole::Admin,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "User")]
pub struct GqlUser {
    pub id: ID,
    pub username: String,
    pub email: String,
    pub role: GqlRole,
    pub created_at: String,
}

impl From<User> for GqlUser {
    fn from(user: User) -> Self {
        Self {
            id: id_of(user.id),
            username: user.username,
            email: user.email,
            role: user.role.into(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex, name = "Project")]
pub struct GqlProject {
    pub id: ID,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: ID,
    pub created_at: String,
    pub updated_at: String,
    #[graphql(skip)]
    pub project_id: ProjectId,
    #[graphql(skip)]
    pub owner_user_id: UserId,
    #[graphql(skip)]
    pub loaders: Option<RequestLoaders>,
}

impl From<Project> for GqlProject {
    fn from(project: Project) -> Self {
        Self {
            id: id_of(project.id),
            owner_id: id_of(project.owner_id),
            name: project.name,
            description: project.description,
            created_at: project.created_at.to_rfc3339(),
            updated_at: project.updated_at.to_rfc3339(),
            project_id: project.id,
            owner_user_id: project.owner_id,
            loaders: None,
        }
    }
}

impl GqlProject {
    /// Resolve this object's relations through `loaders`.
    pub fn with_loaders(mut self, loaders: RequestLoaders) -> Self {
        self.loaders = Some(loaders);
        self
    }

    /// Hand this object's attached loaders down to a child.
    fn attach(&self, task: GqlTask) -> GqlTask {
        match &self.loaders {
            Some(loaders) => task.with_loaders(loaders.clone()),
            None => task,
        }
    }
}

#[ComplexObject]
impl GqlProject {
    async fn owner(&self, ctx: &Context<'_>) -> GqlResult<GqlUser> {
        let user = scoped_loaders(ctx, &self.loaders)?
            .required_user(self.owner_user_id)
            .await
            .map_err(gql_err)?;
        Ok(user.into())
    }

    async fn tasks(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlTask>> {
        let loaders = scoped_loaders(ctx, &self.loaders)?;
        let tasks = loaders.tasks_of(self.project_id).await.map_err(gql_err)?;
        Ok(tasks
            .into_iter()
            .map(|task| self.attach(GqlTask::from(task)))
            .collect())
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex, name = "Task")]
pub struct GqlTask {
    pub id: ID,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub project_id: ID,
    pub assignee_id: ID,
    pub created_at: String,
    pub updated_at: String,
    #[graphql(skip)]
    pub task_project_id: ProjectId,
    #[graphql(skip)]
    pub task_assignee_id: UserId,
    #[graphql(skip)]
    pub loaders: Option<RequestLoaders>,
}

impl From<Task> for GqlTask {
    fn from(task: Task) -> Self {
        Self {
            id: id_of(task.id),
            project_id: id_of(task.project_id),
            assignee_id: id_of(task.assignee_id),
            title: task.title,
            description: task.description,
            completed: task.completed,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
            task_project_id: task.project_id,
            task_assignee_id: task.assignee_id,
            loaders: None,
        }
    }
}

impl GqlTask {
    /// Resolve this object's relations through `loaders`.
    pub fn with_loaders(mut self, loaders: RequestLoaders) -> Self {
        self.loaders = Some(loaders);
        self
    }
}

#[ComplexObject]
impl GqlTask {
    async fn project(&self, ctx: &Context<'_>) -> GqlResult<GqlProject> {
        let project = scoped_loaders(ctx, &self.loaders)?
            .required_project(self.task_project_id)
            .await
            .map_err(gql_err)?;
        let project = GqlProject::from(project);
        Ok(match &self.loaders {
            Some(loaders) => project.with_loaders(loaders.clone()),
            None => project,
        })
    }

    async fn assignee(&self, ctx: &Context<'_>) -> GqlResult<GqlUser> {
        let user = scoped_loaders(ctx, &self.loaders)?
            .required_user(self.task_assignee_id)
            .await
            .map_err(gql_err)?;
        Ok(user.into())
    }
}

// ============================================================================
// INPUT TYPES
// ============================================================================

#[derive(Debug, Clone, InputObject)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, InputObject)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, InputObject)]
pub struct ProjectInput {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateProjectInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<ID>,
}

#[derive(Debug, Clone, InputObject)]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
    pub project_id: ID,
    pub assignee_id: ID,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub project_id: Option<ID>,
    pub assignee_id: Option<ID>,
}

impl UpdateProjectInput {
    fn into_request(self) -> GqlResult<UpdateProjectRequest> {
        Ok(UpdateProjectRequest {
            name: self.name,
            description: self.description,
            owner_id: self.owner_id.as_ref().map(parse_id).transpose()?,
        })
    }
}

impl TaskInput {
    fn into_request(self) -> GqlResult<CreateTaskRequest> {
        Ok(CreateTaskRequest {
            project_id: parse_id(&self.project_id)?,
            assignee_id: parse_id(&self.assignee_id)?,
            title: self.title,
            description: self.description,
        })
    }
}

impl UpdateTaskInput {
    fn into_request(self) -> GqlResult<UpdateTaskRequest> {
        Ok(UpdateTaskRequest {
            project_id: self.project_id.as_ref().map(parse_id).transpose()?,
            assignee_id: self.assignee_id.as_ref().map(parse_id).transpose()?,
            title: self.title,
            description: self.description,
            completed: self.completed,
        })
    }
}

// ============================================================================
// QUERY ROOT
// ============================================================================

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// All users. Admins only.
    async fn users(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlUser>> {
        let auth = require_auth(ctx)?;
        if !auth.is_admin() {
            return Err(ApiError::forbidden("Listing users requires the admin role").extend());
        }
        let users = store(ctx)?.user_list().await.map_err(gql_err)?;
        loaders(ctx)?.prime_users(&users);
        Ok(users.into_iter().map(Into::into).collect())
    }

    /// The authenticated caller, or null when the account no longer exists.
    async fn me(&self, ctx: &Context<'_>) -> GqlResult<Option<GqlUser>> {
        let auth = require_auth(ctx)?;
        let user = loaders(ctx)?.user(auth.user_id).await.map_err(gql_err)?;
        Ok(user.map(Into::into))
    }

    async fn projects(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlProject>> {
        let projects = store(ctx)?.project_list().await.map_err(gql_err)?;
        loaders(ctx)?.prime_projects(&projects);
        Ok(projects.into_iter().map(Into::into).collect())
    }

    async fn project(&self, ctx: &Context<'_>, id: ID) -> GqlResult<Option<GqlProject>> {
        let id: ProjectId = parse_id(&id)?;
        let project = loaders(ctx)?.project(id).await.map_err(gql_err)?;
        Ok(project.map(Into::into))
    }

    /// Tasks, optionally filtered by project and assignee.
    async fn tasks(
        &self,
        ctx: &Context<'_>,
        project_id: Option<ID>,
        assignee_id: Option<ID>,
    ) -> GqlResult<Vec<GqlTask>> {
        let filter = TaskFilter {
            project_id: project_id.as_ref().map(parse_id).transpose()?,
            assignee_id: assignee_id.as_ref().map(parse_id).transpose()?,
        };
        let tasks = store(ctx)?.task_list(filter).await.map_err(gql_err)?;
        Ok(tasks.into_iter().map(Into::into).collect())
    }

    async fn task(&self, ctx: &Context<'_>, id: ID) -> GqlResult<Option<GqlTask>> {
        let id: TaskId = parse_id(&id)?;
        let task = store(ctx)?.task_get(id).await.map_err(gql_err)?;
        Ok(task.map(Into::into))
    }
}

// ============================================================================
// MUTATION ROOT
// ============================================================================

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn register(&self, ctx: &Context<'_>, data: RegisterInput) -> GqlResult<GqlUser> {
        let req = RegisterRequest {
            username: data.username,
            email: data.email,
            password: data.password,
        };
        req.validate().map_err(gql_err)?;

        let password_hash = users::hash_off_thread(req.password).await.map_err(gql_err)?;

        let user = User::new(req.username, req.email, password_hash);
        store(ctx)?.user_insert(&user).await.map_err(gql_err)?;

        info!(user_id = %user.id, "User registered via GraphQL");
        Ok(user.into())
    }

    /// Returns an access token.
    async fn login(&self, ctx: &Context<'_>, data: LoginInput) -> GqlResult<String> {
        let auth_config = ctx.data::<Arc<AuthConfig>>()?;
        let user = users::login_user(store(ctx)?.as_ref(), &data.email, data.password)
            .await
            .map_err(gql_err)?;
        let pair = issue_token_pair(auth_config, user.id, user.role).map_err(gql_err)?;
        Ok(pair.access_token)
    }

    async fn create_project(&self, ctx: &Context<'_>, data: ProjectInput) -> GqlResult<GqlProject> {
        let auth = require_auth(ctx)?;
        let req = CreateProjectRequest {
            name: data.name,
            description: data.description,
        };
        req.validate().map_err(gql_err)?;

        let project = Project::new(req.name.trim(), req.description, auth.user_id);
        store(ctx)?.project_insert(&project).await.map_err(gql_err)?;
        loaders(ctx)?.project_written(&project);

        info!(project_id = %project.id, owner_id = %auth.user_id, "Project created via GraphQL");
        ctx.data::<EventBus>()?
            .publish(TaskboardEvent::ProjectCreated(project.clone()));
        Ok(project.into())
    }

    async fn update_project(
        &self,
        ctx: &Context<'_>,
        id: ID,
        data: UpdateProjectInput,
    ) -> GqlResult<GqlProject> {
        let auth = require_auth(ctx)?;
        let id: ProjectId = parse_id(&id)?;
        let req = data.into_request()?;
        req.validate().map_err(gql_err)?;

        let store = store(ctx)?;
        let mut project = projects::project_or_404(store.as_ref(), id)
            .await
            .map_err(gql_err)?;
        projects::ensure_can_manage_project(&auth, &project).map_err(gql_err)?;
        projects::ensure_can_transfer(&auth, &project, &req).map_err(gql_err)?;

        req.into_patch().apply(&mut project);
        store.project_update(&project).await.map_err(gql_err)?;
        loaders(ctx)?.project_written(&project);

        Ok(project.into())
    }

    /// False when the project does not exist.
    async fn delete_project(&self, ctx: &Context<'_>, id: ID) -> GqlResult<bool> {
        let auth = require_auth(ctx)?;
        let id: ProjectId = parse_id(&id)?;
        let store = store(ctx)?;

        let Some(project) = store.project_get(id).await.map_err(gql_err)? else {
            return Ok(false);
        };
        projects::ensure_can_manage_project(&auth, &project).map_err(gql_err)?;

        let deleted = store.project_delete(id).await.map_err(gql_err)?;
        loaders(ctx)?.project_deleted(id);
        Ok(deleted)
    }

    async fn create_task(&self, ctx: &Context<'_>, data: TaskInput) -> GqlResult<GqlTask> {
        let auth = require_auth(ctx)?;
        let req = data.into_request()?;
        req.validate().map_err(gql_err)?;

        let task = Task::new(req.title.trim(), req.description, req.project_id, req.assignee_id);
        store(ctx)?.task_insert(&task).await.map_err(gql_err)?;
        loaders(ctx)?.task_written(&task, None);

        info!(task_id = %task.id, user_id = %auth.user_id, "Task created via GraphQL");
        ctx.data::<EventBus>()?
            .publish(TaskboardEvent::TaskCreated(task.clone()));
        Ok(task.into())
    }

    async fn update_task(
        &self,
        ctx: &Context<'_>,
        id: ID,
        data: UpdateTaskInput,
    ) -> GqlResult<GqlTask> {
        let auth = require_auth(ctx)?;
        let id: TaskId = parse_id(&id)?;
        let req = data.into_request()?;
        req.validate().map_err(gql_err)?;

        let store = store(ctx)?;
        let mut task = tasks::task_or_404(store.as_ref(), id).await.map_err(gql_err)?;
        tasks::ensure_can_manage_task(store.as_ref(), &auth, &task)
            .await
            .map_err(gql_err)?;

        let previous_project = task.project_id;
        req.into_patch().apply(&mut task);
        store.task_update(&task).await.map_err(gql_err)?;
        loaders(ctx)?.task_written(&task, Some(previous_project));

        Ok(task.into())
    }

    /// False when the task does not exist.
    async fn delete_task(&self, ctx: &Context<'_>, id: ID) -> GqlResult<bool> {
        let auth = require_auth(ctx)?;
        let id: TaskId = parse_id(&id)?;
        let store = store(ctx)?;

        let Some(task) = store.task_get(id).await.map_err(gql_err)? else {
            return Ok(false);
        };
        tasks::ensure_can_manage_task(store.as_ref(), &auth, &task)
            .await
            .map_err(gql_err)?;

        let deleted = store.task_delete(id).await.map_err(gql_err)?;
        loaders(ctx)?.task_written(&task, None);
        Ok(deleted)
    }
}

// ============================================================================
// SUBSCRIPTION ROOT
// ============================================================================

pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Projects created after subscribing. Each event resolves its relations
    /// through its own set of loaders.
    async fn new_project(&self, ctx: &Context<'_>) -> GqlResult<impl Stream<Item = GqlProject>> {
        let rx = ctx.data::<EventBus>()?.subscribe();
        let store = store(ctx)?.clone();
        let config = ctx.data::<LoaderConfig>()?.clone();
        Ok(BroadcastStream::new(rx).filter_map(move |event| {
            let loaders = RequestLoaders::new(store.clone(), config.clone());
            async move {
                match event {
                    Ok(TaskboardEvent::ProjectCreated(project)) => {
                        Some(GqlProject::from(project).with_loaders(loaders))
                    }
                    _ => None,
                }
            }
        }))
    }

    /// Tasks created after subscribing.
    async fn new_task(&self, ctx: &Context<'_>) -> GqlResult<impl Stream<Item = GqlTask>> {
        let rx = ctx.data::<EventBus>()?.subscribe();
        let store = store(ctx)?.clone();
        let config = ctx.data::<LoaderConfig>()?.clone();
        Ok(BroadcastStream::new(rx).filter_map(move |event| {
            let loaders = RequestLoaders::new(store.clone(), config.clone());
            async move {
                match event {
                    Ok(TaskboardEvent::TaskCreated(task)) => {
                        Some(GqlTask::from(task).with_loaders(loaders))
                    }
                    _ => None,
                }
            }
        }))
    }
}

// ============================================================================
// SCHEMA & HANDLERS
// ============================================================================

pub type TaskboardSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

/// Build the schema with its process-wide data. Per-request data
/// (`RequestLoaders`, `AuthContext`) is attached by [`graphql_handler`].
pub fn build_schema(
    store: Arc<dyn Store>,
    auth: Arc<AuthConfig>,
    events: EventBus,
    loader_config: LoaderConfig,
) -> TaskboardSchema {
    Schema::build(QueryRoot, MutationRoot, SubscriptionRoot)
        .data(store)
        .data(auth)
        .data(events)
        .data(loader_config)
        .finish()
}

/// POST /graphql
pub async fn graphql_handler(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner().data(state.request_loaders());
    if let Some(auth) = auth {
        request = request.data(auth);
    }
    state.graphql_schema.execute(request).await.into()
}

/// GET /graphql
pub async fn graphiql_handler() -> impl IntoResponse {
    Html(
        async_graphql::http::GraphiQLSource::build()
            .endpoint("/graphql")
            .subscription_endpoint("/graphql/ws")
            .finish(),
    )
}

/// Routes under `/graphql`, including the websocket subscription endpoint.
pub fn create_router(schema: TaskboardSchema) -> Router<AppState> {
    Router::new()
        .route("/", get(graphiql_handler).post(graphql_handler))
        .route_service("/ws", GraphQLSubscription::new(schema))
}
