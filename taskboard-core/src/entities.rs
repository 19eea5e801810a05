//! Core entity structures

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{EntityIdType, ProjectId, Role, TaskId, Timestamp, UserId};

/// A registered account.
///
/// `password_hash` is a PHC string and is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: Timestamp,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::now_v7(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role: Role::User,
            created_at: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A project owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    pub fn new(name: impl Into<String>, description: Option<String>, owner_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::now_v7(),
            name: name.into(),
            description,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }
}

/// Partial update for a project. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<UserId>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.owner_id.is_none()
    }

    /// Merge the patch into `project`, bumping `updated_at`.
    pub fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(description) = self.description {
            project.description = Some(description);
        }
        if let Some(owner_id) = self.owner_id {
            project.owner_id = owner_id;
        }
        project.updated_at = Utc::now();
    }
}

/// A unit of work inside a project, assigned to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub project_id: ProjectId,
    pub assignee_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Task {
    pub fn new(
        title: impl Into<String>,
        description: Option<String>,
        project_id: ProjectId,
        assignee_id: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::now_v7(),
            title: title.into(),
            description,
            completed: false,
            project_id,
            assignee_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub project_id: Option<ProjectId>,
    pub assignee_id: Option<UserId>,
}

impl TaskPatch {
    /// Merge the patch into `task`, bumping `updated_at`.
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = Some(description);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(project_id) = self.project_id {
            task.project_id = project_id;
        }
        if let Some(assignee_id) = self.assignee_id {
            task.assignee_id = assignee_id;
        }
        task.updated_at = Utc::now();
    }
}

/// Filter for task listings. Empty filter matches every task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub project_id: Option<ProjectId>,
    pub assignee_id: Option<UserId>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.project_id.map_or(true, |id| task.project_id == id)
            && self.assignee_id.map_or(true, |id| task.assignee_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_password_not_serialized() {
        let user = User::new("alice", "alice@example.com", "$argon2id$secret");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_project_patch_keeps_unset_fields() {
        let owner = UserId::now_v7();
        let mut project = Project::new("Apollo", Some("moon".to_string()), owner);
        let created = project.updated_at;

        ProjectPatch {
            name: Some("Artemis".to_string()),
            ..Default::default()
        }
        .apply(&mut project);

        assert_eq!(project.name, "Artemis");
        assert_eq!(project.description.as_deref(), Some("moon"));
        assert_eq!(project.owner_id, owner);
        assert!(project.updated_at >= created);
    }

    #[test]
    fn test_task_patch_reassigns() {
        let mut task = Task::new("write docs", None, ProjectId::now_v7(), UserId::now_v7());
        let bob = UserId::now_v7();
        TaskPatch {
            completed: Some(true),
            assignee_id: Some(bob),
            ..Default::default()
        }
        .apply(&mut task);
        assert!(task.completed);
        assert_eq!(task.assignee_id, bob);
    }

    #[test]
    fn test_task_filter() {
        let project = ProjectId::now_v7();
        let assignee = UserId::now_v7();
        let task = Task::new("t", None, project, assignee);

        assert!(TaskFilter::default().matches(&task));
        assert!(TaskFilter {
            project_id: Some(project),
            assignee_id: Some(assignee)
        }
        .matches(&task));
        assert!(!TaskFilter {
            project_id: Some(ProjectId::now_v7()),
            assignee_id: None
        }
        .matches(&task));
    }
}
