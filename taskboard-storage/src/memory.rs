//! In-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use taskboard_core::{
    EntityType, Project, ProjectId, StorageError, Task, TaskFilter, TaskId, User, UserId,
};
use tokio::sync::RwLock;

use crate::{StorageResult, Store};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    projects: HashMap<ProjectId, Project>,
    tasks: HashMap<TaskId, Task>,
}

impl Tables {
    fn require_user(&self, entity_type: EntityType, id: uuid::Uuid, user_id: UserId) -> StorageResult<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(StorageError::DanglingReference {
                entity_type,
                id,
                missing: EntityType::User,
                missing_id: user_id.into(),
            })
        }
    }

    fn require_project(&self, task: &Task) -> StorageResult<()> {
        if self.projects.contains_key(&task.project_id) {
            Ok(())
        } else {
            Err(StorageError::DanglingReference {
                entity_type: EntityType::Task,
                id: task.id.into(),
                missing: EntityType::Project,
                missing_id: task.project_id.into(),
            })
        }
    }
}

/// Store backed by in-process hash maps.
///
/// Cheap to clone; clones share the same tables. Counts every trait call in
/// [`MemoryStore::round_trips`] so tests can observe how many queries a
/// request issued.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    round_trips: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls made so far.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Reset the round-trip counter.
    pub fn reset_round_trips(&self) {
        self.round_trips.store(0, Ordering::Relaxed);
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn project_count(&self) -> usize {
        self.tables.read().await.projects.len()
    }

    pub async fn task_count(&self) -> usize {
        self.tables.read().await.tasks.len()
    }

    fn round_trip(&self) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
    }
}

fn sorted_by_id<T, K: Ord>(mut rows: Vec<T>, id: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|row| id(row));
    rows
}

#[async_trait]
impl Store for MemoryStore {
    // === User Operations ===

    async fn user_insert(&self, user: &User) -> StorageResult<()> {
        self.round_trip();
        let mut tables = self.tables.write().await;

        let conflict = tables.users.values().find_map(|existing| {
            if existing.username == user.username {
                Some(("username", user.username.clone()))
            } else if existing.email.eq_ignore_ascii_case(&user.email) {
                Some(("email", user.email.clone()))
            } else {
                None
            }
        });
        if let Some((field, value)) = conflict {
            return Err(StorageError::AlreadyExists {
                entity_type: EntityType::User,
                field: field.to_string(),
                value,
            });
        }
        if tables.users.contains_key(&user.id) {
            return Err(StorageError::AlreadyExists {
                entity_type: EntityType::User,
                field: "id".to_string(),
                value: user.id.to_string(),
            });
        }

        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user_get(&self, id: UserId) -> StorageResult<Option<User>> {
        self.round_trip();
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        self.round_trip();
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn user_list(&self) -> StorageResult<Vec<User>> {
        self.round_trip();
        let users = self.tables.read().await.users.values().cloned().collect();
        Ok(sorted_by_id(users, |u: &User| u.id))
    }

    async fn user_get_many(&self, ids: &[UserId]) -> StorageResult<Vec<User>> {
        self.round_trip();
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    // === Project Operations ===

    async fn project_insert(&self, project: &Project) -> StorageResult<()> {
        self.round_trip();
        let mut tables = self.tables.write().await;
        if tables.projects.contains_key(&project.id) {
            return Err(StorageError::AlreadyExists {
                entity_type: EntityType::Project,
                field: "id".to_string(),
                value: project.id.to_string(),
            });
        }
        tables.require_user(EntityType::Project, project.id.into(), project.owner_id)?;
        tables.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn project_get(&self, id: ProjectId) -> StorageResult<Option<Project>> {
        self.round_trip();
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn project_list(&self) -> StorageResult<Vec<Project>> {
        self.round_trip();
        let projects = self.tables.read().await.projects.values().cloned().collect();
        Ok(sorted_by_id(projects, |p: &Project| p.id))
    }

    async fn project_get_many(&self, ids: &[ProjectId]) -> StorageResult<Vec<Project>> {
        self.round_trip();
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.projects.get(id).cloned())
            .collect())
    }

    async fn project_update(&self, project: &Project) -> StorageResult<()> {
        self.round_trip();
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&project.id) {
            return Err(StorageError::not_found(EntityType::Project, project.id));
        }
        tables.require_user(EntityType::Project, project.id.into(), project.owner_id)?;
        tables.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn project_delete(&self, id: ProjectId) -> StorageResult<bool> {
        self.round_trip();
        let mut tables = self.tables.write().await;
        if tables.projects.remove(&id).is_none() {
            return Ok(false);
        }
        tables.tasks.retain(|_, task| task.project_id != id);
        Ok(true)
    }

    // === Task Operations ===

    async fn task_insert(&self, task: &Task) -> StorageResult<()> {
        self.round_trip();
        let mut tables = self.tables.write().await;
        if tables.tasks.contains_key(&task.id) {
            return Err(StorageError::AlreadyExists {
                entity_type: EntityType::Task,
                field: "id".to_string(),
                value: task.id.to_string(),
            });
        }
        tables.require_project(task)?;
        tables.require_user(EntityType::Task, task.id.into(), task.assignee_id)?;
        tables.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn task_get(&self, id: TaskId) -> StorageResult<Option<Task>> {
        self.round_trip();
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn task_list(&self, filter: TaskFilter) -> StorageResult<Vec<Task>> {
        self.round_trip();
        let tasks = self
            .tables
            .read()
            .await
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect();
        Ok(sorted_by_id(tasks, |t: &Task| t.id))
    }

    async fn task_list_by_projects(&self, project_ids: &[ProjectId]) -> StorageResult<Vec<Task>> {
        self.round_trip();
        let tables = self.tables.read().await;
        let tasks = tables
            .tasks
            .values()
            .filter(|task| project_ids.contains(&task.project_id))
            .cloned()
            .collect();
        Ok(sorted_by_id(tasks, |t: &Task| t.id))
    }

    async fn task_update(&self, task: &Task) -> StorageResult<()> {
        self.round_trip();
        let mut tables = self.tables.write().await;
        if !tables.tasks.contains_key(&task.id) {
            return Err(StorageError::not_found(EntityType::Task, task.id));
        }
        tables.require_project(task)?;
        tables.require_user(EntityType::Task, task.id.into(), task.assignee_id)?;
        tables.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn task_delete(&self, id: TaskId) -> StorageResult<bool> {
        self.round_trip();
        Ok(self.tables.write().await.tasks.remove(&id).is_some())
    }
}
