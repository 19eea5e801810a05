//! Project REST Routes
//!
//! Reads are public. Writes need an access token; updates and deletes are
//! limited to the owner or an admin.

use std::sync::Arc;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use taskboard_core::{EntityType, Project, ProjectId, StorageError, TaskFilter};
use taskboard_storage::Store;
use tracing::info;

use crate::{
    auth::AuthContext,
    error::{ApiError, ApiResult},
    events::{EventBus, TaskboardEvent},
    extractors::PathId,
    middleware::AuthExtractor,
    state::AppState,
    types::{
        CreateProjectRequest, ProjectDetailResponse, ProjectResponse, UpdateProjectRequest,
        UserResponse,
    },
};

/// Fetch a project or fail with 404.
pub(crate) async fn project_or_404(store: &dyn Store, id: ProjectId) -> ApiResult<Project> {
    store
        .project_get(id)
        .await?
        .ok_or_else(|| StorageError::not_found(EntityType::Project, id).into())
}

pub(crate) fn ensure_can_manage_project(auth: &AuthContext, project: &Project) -> ApiResult<()> {
    if auth.can_manage_project(project) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the project owner or an admin may do this"))
    }
}

/// Only admins may hand a project to someone else.
pub(crate) fn ensure_can_transfer(
    auth: &AuthContext,
    project: &Project,
    req: &UpdateProjectRequest,
) -> ApiResult<()> {
    match req.owner_id {
        Some(owner_id) if owner_id != project.owner_id && !auth.is_admin() => Err(
            ApiError::forbidden("Only an admin may transfer project ownership"),
        ),
        _ => Ok(()),
    }
}

/// GET /projects
#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    responses(
        (status = 200, description = "All projects", body = Vec<ProjectResponse>),
    ),
)]
pub async fn list_projects(
    State(store): State<Arc<dyn Store>>,
) -> ApiResult<Json<Vec<ProjectResponse>>> {
    let projects = store.project_list().await?;
    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

/// GET /projects/{id}
#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Project with owner and tasks", body = ProjectDetailResponse),
        (status = 404, description = "Project not found", body = ApiError),
    ),
)]
pub async fn get_project(
    State(store): State<Arc<dyn Store>>,
    PathId(id): PathId<ProjectId>,
) -> ApiResult<Json<ProjectDetailResponse>> {
    let project = project_or_404(store.as_ref(), id).await?;

    let (owner, tasks) = tokio::try_join!(
        store.user_get(project.owner_id),
        store.task_list(TaskFilter {
            project_id: Some(id),
            assignee_id: None,
        }),
    )?;

    Ok(Json(ProjectDetailResponse {
        project: project.into(),
        owner: owner.map(UserResponse::from),
        tasks: tasks.into_iter().map(Into::into).collect(),
    }))
}

/// POST /projects
#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "Invalid input", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    State(store): State<Arc<dyn Store>>,
    State(events): State<EventBus>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let project = Project::new(req.name.trim(), req.description, auth.user_id);
    store.project_insert(&project).await?;

    info!(project_id = %project.id, owner_id = %auth.user_id, "Project created");
    events.publish(TaskboardEvent::ProjectCreated(project.clone()));

    Ok((StatusCode::CREATED, Json(ProjectResponse::from(project))))
}

/// PUT /projects/{id}
#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated", body = ProjectResponse),
        (status = 400, description = "Invalid input", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    State(store): State<Arc<dyn Store>>,
    AuthExtractor(auth): AuthExtractor,
    PathId(id): PathId<ProjectId>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    req.validate()?;

    let mut project = project_or_404(store.as_ref(), id).await?;
    ensure_can_manage_project(&auth, &project)?;
    ensure_can_transfer(&auth, &project, &req)?;

    req.into_patch().apply(&mut project);
    store.project_update(&project).await?;

    info!(project_id = %id, user_id = %auth.user_id, "Project updated");
    Ok(Json(project.into()))
}

/// DELETE /projects/{id}
#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    responses(
        (status = 204, description = "Project and its tasks deleted"),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    State(store): State<Arc<dyn Store>>,
    AuthExtractor(auth): AuthExtractor,
    PathId(id): PathId<ProjectId>,
) -> ApiResult<StatusCode> {
    let project = project_or_404(store.as_ref(), id).await?;
    ensure_can_manage_project(&auth, &project)?;

    if !store.project_delete(id).await? {
        return Err(StorageError::not_found(EntityType::Project, id).into());
    }

    info!(project_id = %id, user_id = %auth.user_id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Routes under `/projects`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
}
