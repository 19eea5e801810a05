//! Per-request loaders.
//!
//! A fresh [`RequestLoaders`] is built for every GraphQL request and dropped
//! with it, so memoized rows never leak between requests or users.

use std::sync::Arc;

use taskboard_core::{Project, ProjectId, Task, User, UserId};
use taskboard_loader::{Loader, LoaderConfig};
use taskboard_storage::{
    ProjectBatch, ProjectLoader, ProjectTasksBatch, ProjectTasksLoader, Store, UserBatch,
    UserLoader,
};

use crate::error::{ApiError, ApiResult};

/// The loaders one request shares across all of its field resolvers.
#[derive(Debug, Clone)]
pub struct RequestLoaders {
    pub users: UserLoader,
    pub projects: ProjectLoader,
    pub project_tasks: ProjectTasksLoader,
}

impl RequestLoaders {
    pub fn new(store: Arc<dyn Store>, config: LoaderConfig) -> Self {
        Self {
            users: Loader::with_config(UserBatch::new(store.clone()), config.clone()),
            projects: Loader::with_config(ProjectBatch::new(store.clone()), config.clone()),
            project_tasks: Loader::with_config(ProjectTasksBatch::new(store), config),
        }
    }

    pub async fn user(&self, id: UserId) -> ApiResult<Option<User>> {
        Ok(self.users.load(id).await?)
    }

    pub async fn project(&self, id: ProjectId) -> ApiResult<Option<Project>> {
        Ok(self.projects.load(id).await?)
    }

    pub async fn tasks_of(&self, project_id: ProjectId) -> ApiResult<Vec<Task>> {
        Ok(self.project_tasks.load(project_id).await?)
    }

    /// Load a user that a foreign key points at; absence is a storage fault.
    pub async fn required_user(&self, id: UserId) -> ApiResult<User> {
        self.user(id).await?.ok_or_else(|| {
            ApiError::storage_error(format!("Referenced user {} is missing", id))
        })
    }

    pub async fn required_project(&self, id: ProjectId) -> ApiResult<Project> {
        self.project(id).await?.ok_or_else(|| {
            ApiError::storage_error(format!("Referenced project {} is missing", id))
        })
    }

    /// Seed rows this request has already read so resolvers reuse them.
    pub fn prime_projects<'a>(&self, projects: impl IntoIterator<Item = &'a Project>) {
        for project in projects {
            self.projects.prime(project.id, Some(project.clone()));
        }
    }

    pub fn prime_users<'a>(&self, users: impl IntoIterator<Item = &'a User>) {
        for user in users {
            self.users.prime(user.id, Some(user.clone()));
        }
    }

    /// Reflect a project write in this request's memo tables.
    pub fn project_written(&self, project: &Project) {
        self.projects.prime_force(project.id, Some(project.clone()));
    }

    pub fn project_deleted(&self, id: ProjectId) {
        self.projects.prime_force(id, None);
        self.project_tasks.clear(&id);
    }

    /// Invalidate the task lists a task write touches; `previous` is the
    /// project the task belonged to before an update.
    pub fn task_written(&self, task: &Task, previous: Option<ProjectId>) {
        self.project_tasks.clear(&task.project_id);
        if let Some(previous) = previous {
            self.project_tasks.clear(&previous);
        }
    }
}
