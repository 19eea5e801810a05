//! Taskboard Storage
//!
//! The async [`Store`] trait every backend implements, an in-memory
//! [`MemoryStore`], and the batch functions that plug the store into
//! request-scoped loaders.

mod batch;
mod memory;

pub use batch::{
    ProjectBatch, ProjectLoader, ProjectTasksBatch, ProjectTasksLoader, UserBatch, UserLoader,
};
pub use memory::MemoryStore;

use async_trait::async_trait;
use taskboard_core::{
    Project, ProjectId, StorageError, Task, TaskFilter, TaskId, User, UserId,
};

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Async storage trait for Taskboard entities.
///
/// Every method is one round trip to the backend. The `*_get_many` and
/// `task_list_by_projects` methods exist so batch loaders can resolve many
/// keys with a single call; they return rows in no particular order and
/// silently omit ids that do not exist.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    /// Insert a new user. Fails if the username or email is taken.
    async fn user_insert(&self, user: &User) -> StorageResult<()>;

    async fn user_get(&self, id: UserId) -> StorageResult<Option<User>>;

    /// Find a user by email (case-insensitive).
    async fn user_find_by_email(&self, email: &str) -> StorageResult<Option<User>>;

    async fn user_list(&self) -> StorageResult<Vec<User>>;

    async fn user_get_many(&self, ids: &[UserId]) -> StorageResult<Vec<User>>;

    // ========================================================================
    // PROJECT OPERATIONS
    // ========================================================================

    /// Insert a new project. The owner must exist.
    async fn project_insert(&self, project: &Project) -> StorageResult<()>;

    async fn project_get(&self, id: ProjectId) -> StorageResult<Option<Project>>;

    async fn project_list(&self) -> StorageResult<Vec<Project>>;

    async fn project_get_many(&self, ids: &[ProjectId]) -> StorageResult<Vec<Project>>;

    /// Replace an existing project.
    async fn project_update(&self, project: &Project) -> StorageResult<()>;

    /// Delete a project and its tasks. Returns whether the project existed.
    async fn project_delete(&self, id: ProjectId) -> StorageResult<bool>;

    // ========================================================================
    // TASK OPERATIONS
    // ========================================================================

    /// Insert a new task. Project and assignee must exist.
    async fn task_insert(&self, task: &Task) -> StorageResult<()>;

    async fn task_get(&self, id: TaskId) -> StorageResult<Option<Task>>;

    async fn task_list(&self, filter: TaskFilter) -> StorageResult<Vec<Task>>;

    /// All tasks belonging to any of `project_ids`.
    async fn task_list_by_projects(&self, project_ids: &[ProjectId]) -> StorageResult<Vec<Task>>;

    /// Replace an existing task.
    async fn task_update(&self, task: &Task) -> StorageResult<()>;

    /// Delete a task. Returns whether it existed.
    async fn task_delete(&self, id: TaskId) -> StorageResult<bool>;
}
