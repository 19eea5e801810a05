//! Taskboard Test Utilities
//!
//! Shared test infrastructure for the Taskboard workspace:
//! - Proptest generators for ids, users, projects and tasks
//! - Fixtures, including a seeded [`MemoryStore`]
//! - Assertions for storage and validation errors

pub use taskboard_storage::{MemoryStore, StorageResult, Store};

pub use taskboard_core::{
    EntityIdType, EntityType, Project, ProjectId, Role, StorageError, Task, TaskFilter, TaskId,
    Timestamp, User, UserId, ValidationError,
};

use uuid::Uuid;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Taskboard entity types.

    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    // === Identity Type Generators ===

    /// Random UUID, never nil.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>()
            .prop_map(Uuid::from_bytes)
            .prop_filter("nil uuid", |u| !u.is_nil())
    }

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        arb_uuid().prop_map(UserId::new)
    }

    pub fn arb_project_id() -> impl Strategy<Value = ProjectId> {
        arb_uuid().prop_map(ProjectId::new)
    }

    pub fn arb_task_id() -> impl Strategy<Value = TaskId> {
        arb_uuid().prop_map(TaskId::new)
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-01-01 .. 2030-01-01
        (1_577_836_800i64..1_893_456_000i64)
            .prop_map(|secs| Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now))
    }

    // === Enum Generators ===

    pub fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::User), Just(Role::Admin)]
    }

    // === Input Generators ===

    /// Usernames accepted by registration.
    pub fn arb_username() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_.-]{3,32}"
    }

    /// Usernames rejected by registration: too short, too long, or with a
    /// forbidden character.
    pub fn arb_invalid_username() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{0,2}",
            "[a-z]{33,40}",
            "[a-z]{2,8}[ @!/#][a-z]{2,8}",
        ]
    }

    pub fn arb_email() -> impl Strategy<Value = String> {
        ("[a-z0-9._]{1,16}", "[a-z0-9]{1,12}", "[a-z]{2,6}")
            .prop_map(|(local, domain, tld)| format!("{}@{}.{}", local, domain, tld))
    }

    pub fn arb_password() -> impl Strategy<Value = String> {
        "[A-Za-z0-9!@#$%^&*]{8,64}"
    }

    pub fn arb_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,40}"
    }

    // === Entity Generators ===

    pub fn arb_user() -> impl Strategy<Value = User> {
        (arb_user_id(), arb_username(), arb_email(), arb_role(), arb_timestamp()).prop_map(
            |(id, username, email, role, created_at)| User {
                id,
                username,
                email,
                password_hash: String::from("$argon2id$placeholder"),
                role,
                created_at,
            },
        )
    }

    pub fn arb_project(owner_id: UserId) -> impl Strategy<Value = Project> {
        (
            arb_project_id(),
            arb_name(),
            proptest::option::of(arb_name()),
            arb_timestamp(),
        )
            .prop_map(move |(id, name, description, created_at)| Project {
                id,
                name,
                description,
                owner_id,
                created_at,
                updated_at: created_at,
            })
    }

    pub fn arb_task(project_id: ProjectId, assignee_id: UserId) -> impl Strategy<Value = Task> {
        (
            arb_task_id(),
            arb_name(),
            proptest::option::of(arb_name()),
            any::<bool>(),
            arb_timestamp(),
        )
            .prop_map(move |(id, title, description, completed, created_at)| Task {
                id,
                title,
                description,
                completed,
                project_id,
                assignee_id,
                created_at,
                updated_at: created_at,
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;

    /// Hash stored by fixture users. Not a valid Argon2 hash, so these
    /// users cannot log in.
    pub const FIXTURE_PASSWORD_HASH: &str = "$argon2id$fixture";

    pub fn user(username: &str) -> User {
        User::new(
            username,
            format!("{}@example.com", username),
            FIXTURE_PASSWORD_HASH,
        )
    }

    pub fn admin(username: &str) -> User {
        user(username).with_role(Role::Admin)
    }

    pub fn project(name: &str, owner: &User) -> Project {
        Project::new(name, Some(format!("{} description", name)), owner.id)
    }

    pub fn task(title: &str, project: &Project, assignee: &User) -> Task {
        Task::new(title, None, project.id, assignee.id)
    }

    /// A populated store and the rows written into it.
    #[derive(Clone)]
    pub struct SeededStore {
        pub store: MemoryStore,
        pub owners: Vec<User>,
        pub assignees: Vec<User>,
        pub projects: Vec<Project>,
        pub tasks: Vec<Task>,
    }

    impl SeededStore {
        /// Tasks of one project, in insertion order.
        pub fn tasks_of(&self, project_id: ProjectId) -> Vec<&Task> {
            self.tasks
                .iter()
                .filter(|t| t.project_id == project_id)
                .collect()
        }
    }

    /// Seed `projects` projects, each with its own owner and
    /// `tasks_per_project` tasks. Task `i` of every project goes to assignee
    /// `i`, and assignees are never owners.
    ///
    /// The round-trip counter is reset afterwards.
    pub async fn seeded_store(projects: usize, tasks_per_project: usize) -> StorageResult<SeededStore> {
        let store = MemoryStore::new();

        let mut owners = Vec::with_capacity(projects);
        for i in 0..projects {
            let owner = user(&format!("owner{}", i));
            store.user_insert(&owner).await?;
            owners.push(owner);
        }

        let mut assignees = Vec::with_capacity(tasks_per_project);
        for i in 0..tasks_per_project {
            let assignee = user(&format!("assignee{}", i));
            store.user_insert(&assignee).await?;
            assignees.push(assignee);
        }

        let mut seeded_projects = Vec::with_capacity(projects);
        let mut tasks = Vec::with_capacity(projects * tasks_per_project);
        for (i, owner) in owners.iter().enumerate() {
            let project = project(&format!("Project {}", i), owner);
            store.project_insert(&project).await?;
            for (j, assignee) in assignees.iter().enumerate() {
                let task = task(&format!("Task {}.{}", i, j), &project, assignee);
                store.task_insert(&task).await?;
                tasks.push(task);
            }
            seeded_projects.push(project);
        }

        store.reset_round_trips();
        Ok(SeededStore {
            store,
            owners,
            assignees,
            projects: seeded_projects,
            tasks,
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Taskboard-specific error shapes.

    use super::*;

    /// Assert that a storage call failed with NotFound for `entity_type`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &StorageResult<T>, entity_type: EntityType) {
        match result {
            Err(StorageError::NotFound { entity_type: et, .. }) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", entity_type, other),
        }
    }

    /// Assert that a storage call failed with AlreadyExists on `field`.
    #[track_caller]
    pub fn assert_already_exists<T: std::fmt::Debug>(result: &StorageResult<T>, field: &str) {
        match result {
            Err(StorageError::AlreadyExists { field: f, .. }) => {
                assert_eq!(f, field, "Wrong field in AlreadyExists error");
            }
            other => panic!("Expected AlreadyExists on {}, got: {:?}", field, other),
        }
    }

    /// Assert that a storage call failed because `missing` does not exist.
    #[track_caller]
    pub fn assert_dangling_reference<T: std::fmt::Debug>(
        result: &StorageResult<T>,
        missing: EntityType,
    ) {
        match result {
            Err(StorageError::DanglingReference { missing: m, .. }) => {
                assert_eq!(*m, missing, "Wrong missing entity in DanglingReference error");
            }
            other => panic!("Expected DanglingReference to {:?}, got: {:?}", missing, other),
        }
    }

    /// Assert that validation failed on `field`, whether missing or invalid.
    #[track_caller]
    pub fn assert_validation_field<T: std::fmt::Debug>(
        result: &Result<T, ValidationError>,
        field: &str,
    ) {
        match result {
            Err(ValidationError::RequiredFieldMissing { field: f })
            | Err(ValidationError::InvalidValue { field: f, .. }) => {
                assert_eq!(f, field, "Validation failed on the wrong field");
            }
            Ok(v) => panic!("Expected validation error on {}, got Ok({:?})", field, v),
        }
    }

    /// Assert two id collections hold the same ids, ignoring order.
    #[track_caller]
    pub fn assert_same_ids<T: Ord + Copy + std::fmt::Debug>(actual: &[T], expected: &[T]) {
        let mut actual = actual.to_vec();
        let mut expected = expected.to_vec();
        actual.sort();
        expected.sort();
        assert_eq!(actual, expected, "Id sets differ");
    }
}
