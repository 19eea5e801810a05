//! Taskboard Core - Entity Types
//!
//! Plain data structures shared by every other crate: identifiers, users,
//! projects, tasks, input validation and the error taxonomy. No I/O here.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod validation;

pub use entities::{Project, ProjectPatch, Task, TaskFilter, TaskPatch, User};
pub use enums::{EntityType, Role};
pub use error::{ConfigError, StorageError, TaskboardError, TaskboardResult, ValidationError};
pub use identity::{EntityIdType, ProjectId, TaskId, Timestamp, UserId};
