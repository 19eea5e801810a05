//! Task REST Routes
//!
//! Reads are public. Creating a task needs an access token; updates and
//! deletes are limited to the assignee, the project owner, or an admin.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use taskboard_core::{EntityType, StorageError, Task, TaskFilter, TaskId};
use taskboard_storage::Store;
use tracing::info;

use crate::{
    auth::AuthContext,
    error::{ApiError, ApiResult},
    events::{EventBus, TaskboardEvent},
    extractors::PathId,
    middleware::AuthExtractor,
    state::AppState,
    types::{CreateTaskRequest, TaskListQuery, TaskResponse, UpdateTaskRequest},
};

pub(crate) async fn task_or_404(store: &dyn Store, id: TaskId) -> ApiResult<Task> {
    store
        .task_get(id)
        .await?
        .ok_or_else(|| StorageError::not_found(EntityType::Task, id).into())
}

/// Check the caller may modify `task`, looking up its project for the owner.
pub(crate) async fn ensure_can_manage_task(
    store: &dyn Store,
    auth: &AuthContext,
    task: &Task,
) -> ApiResult<()> {
    // The assignee and admins never need the project lookup.
    if auth.can_manage_task(task, None) {
        return Ok(());
    }
    let project = store.project_get(task.project_id).await?;
    if auth.can_manage_task(task, project.as_ref()) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only the assignee, the project owner or an admin may do this",
        ))
    }
}

/// GET /tasks
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    params(TaskListQuery),
    responses(
        (status = 200, description = "Matching tasks", body = Vec<TaskResponse>),
    ),
)]
pub async fn list_tasks(
    State(store): State<Arc<dyn Store>>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let tasks = store
        .task_list(TaskFilter {
            project_id: query.project_id,
            assignee_id: query.assignee_id,
        })
        .await?;
    Ok(Json(tasks.into_iter().map(Into::into).collect()))
}

/// GET /tasks/{id}
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task", body = TaskResponse),
        (status = 404, description = "Task not found", body = ApiError),
    ),
)]
pub async fn get_task(
    State(store): State<Arc<dyn Store>>,
    PathId(id): PathId<TaskId>,
) -> ApiResult<Json<TaskResponse>> {
    Ok(Json(task_or_404(store.as_ref(), id).await?.into()))
}

/// POST /tasks
#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Invalid input or unknown project/assignee", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    State(store): State<Arc<dyn Store>>,
    State(events): State<EventBus>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let task = Task::new(req.title.trim(), req.description, req.project_id, req.assignee_id);
    store.task_insert(&task).await?;

    info!(task_id = %task.id, project_id = %task.project_id, user_id = %auth.user_id, "Task created");
    events.publish(TaskboardEvent::TaskCreated(task.clone()));

    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

/// PUT /tasks/{id}
#[utoipa::path(
    put,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 400, description = "Invalid input", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Not allowed to modify this task", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    State(store): State<Arc<dyn Store>>,
    AuthExtractor(auth): AuthExtractor,
    PathId(id): PathId<TaskId>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    req.validate()?;

    let mut task = task_or_404(store.as_ref(), id).await?;
    ensure_can_manage_task(store.as_ref(), &auth, &task).await?;

    req.into_patch().apply(&mut task);
    store.task_update(&task).await?;

    info!(task_id = %id, user_id = %auth.user_id, "Task updated");
    Ok(Json(task.into()))
}

/// DELETE /tasks/{id}
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Not allowed to delete this task", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    State(store): State<Arc<dyn Store>>,
    AuthExtractor(auth): AuthExtractor,
    PathId(id): PathId<TaskId>,
) -> ApiResult<StatusCode> {
    let task = task_or_404(store.as_ref(), id).await?;
    ensure_can_manage_task(store.as_ref(), &auth, &task).await?;

    if !store.task_delete(id).await? {
        return Err(StorageError::not_found(EntityType::Task, id).into());
    }

    info!(task_id = %id, user_id = %auth.user_id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Routes under `/tasks`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
}
