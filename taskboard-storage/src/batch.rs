//! Batch functions backing the per-request loaders.
//!
//! Each one turns a list of unique keys into a single store call and then
//! re-aligns the unordered rows with the requested keys, the same shape as a
//! `WHERE id IN (...)` query followed by a lookup map.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use taskboard_core::{EntityIdType, Project, ProjectId, StorageError, Task, User, UserId};
use taskboard_loader::{BatchFn, Loader};
use tracing::trace;

use crate::Store;

/// Loader resolving users by id; missing users resolve to `None`.
pub type UserLoader = Loader<UserId, Option<User>, UserBatch>;

/// Loader resolving projects by id; missing projects resolve to `None`.
pub type ProjectLoader = Loader<ProjectId, Option<Project>, ProjectBatch>;

/// Loader resolving the task list of each project.
pub type ProjectTasksLoader = Loader<ProjectId, Vec<Task>, ProjectTasksBatch>;

type Aligned<V> = Result<Vec<Result<V, StorageError>>, StorageError>;

/// Index rows by key, then emit one entry per requested key in order.
fn align<K, V>(keys: &[K], rows: Vec<V>, key_of: impl Fn(&V) -> K) -> Vec<Result<Option<V>, StorageError>>
where
    K: Eq + Hash,
{
    let mut by_key: HashMap<K, V> = rows.into_iter().map(|row| (key_of(&row), row)).collect();
    keys.iter().map(|key| Ok(by_key.remove(key))).collect()
}

fn reject_nil<I: EntityIdType>(id: &I) -> Result<(), String> {
    if id.is_nil() {
        Err(format!("nil {} id", I::ENTITY_NAME))
    } else {
        Ok(())
    }
}

/// Batch function for [`UserLoader`].
#[derive(Clone)]
pub struct UserBatch {
    store: Arc<dyn Store>,
}

impl UserBatch {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchFn<UserId, Option<User>> for UserBatch {
    type Error = StorageError;

    async fn load(&self, keys: &[UserId]) -> Aligned<Option<User>> {
        trace!(keys = keys.len(), "batch loading users");
        let users = self.store.user_get_many(keys).await?;
        Ok(align(keys, users, |user| user.id))
    }

    fn validate_key(&self, key: &UserId) -> Result<(), String> {
        reject_nil(key)
    }
}

/// Batch function for [`ProjectLoader`].
#[derive(Clone)]
pub struct ProjectBatch {
    store: Arc<dyn Store>,
}

impl ProjectBatch {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchFn<ProjectId, Option<Project>> for ProjectBatch {
    type Error = StorageError;

    async fn load(&self, keys: &[ProjectId]) -> Aligned<Option<Project>> {
        trace!(keys = keys.len(), "batch loading projects");
        let projects = self.store.project_get_many(keys).await?;
        Ok(align(keys, projects, |project| project.id))
    }

    fn validate_key(&self, key: &ProjectId) -> Result<(), String> {
        reject_nil(key)
    }
}

/// Batch function for [`ProjectTasksLoader`].
#[derive(Clone)]
pub struct ProjectTasksBatch {
    store: Arc<dyn Store>,
}

impl ProjectTasksBatch {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchFn<ProjectId, Vec<Task>> for ProjectTasksBatch {
    type Error = StorageError;

    async fn load(&self, keys: &[ProjectId]) -> Aligned<Vec<Task>> {
        trace!(keys = keys.len(), "batch loading project tasks");
        let tasks = self.store.task_list_by_projects(keys).await?;

        let mut grouped: HashMap<ProjectId, Vec<Task>> = HashMap::new();
        for task in tasks {
            grouped.entry(task.project_id).or_default().push(task);
        }
        Ok(keys
            .iter()
            .map(|key| Ok(grouped.remove(key).unwrap_or_default()))
            .collect())
    }

    fn validate_key(&self, key: &ProjectId) -> Result<(), String> {
        reject_nil(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_preserves_key_order_and_gaps() {
        let keys = vec![3u8, 1, 2];
        let rows = vec![(1u8, "one"), (3u8, "three")];
        let aligned = align(&keys, rows, |row| row.0);

        let names: Vec<Option<&str>> = aligned
            .into_iter()
            .map(|r| r.unwrap().map(|row| row.1))
            .collect();
        assert_eq!(names, vec![Some("three"), Some("one"), None]);
    }

    #[test]
    fn test_reject_nil() {
        assert!(reject_nil(&UserId::nil()).is_err());
        assert!(reject_nil(&UserId::now_v7()).is_ok());
    }
}
