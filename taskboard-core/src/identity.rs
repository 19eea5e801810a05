//! Identity types for Taskboard entities

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Common behaviour of the strongly-typed entity identifiers.
///
/// Every id wraps a UUIDv7, so ids sort by creation time.
pub trait EntityIdType:
    Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display + FromStr + Send + Sync + 'static
{
    /// Human-readable entity name used in error messages.
    const ENTITY_NAME: &'static str;

    fn new(uuid: Uuid) -> Self;

    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh, timestamp-sortable id.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    fn is_nil(&self) -> bool {
        self.as_uuid().is_nil()
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_entity_id!(
    /// Identifier of a [`User`](crate::User).
    UserId,
    "user"
);
define_entity_id!(
    /// Identifier of a [`Project`](crate::Project).
    ProjectId,
    "project"
);
define_entity_id!(
    /// Identifier of a [`Task`](crate::Task).
    TaskId,
    "task"
);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_parse_roundtrip() {
        let id = UserId::now_v7();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_nil() {
        assert!(TaskId::nil().is_nil());
        assert!(!TaskId::now_v7().is_nil());
    }

    #[test]
    fn test_serde_transparent() {
        let uuid = Uuid::now_v7();
        let json = serde_json::to_string(&ProjectId::new(uuid)).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn test_v7_ids_sort_by_creation() {
        let first = ProjectId::now_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = ProjectId::now_v7();
        assert!(first < second);
    }

    proptest! {
        #[test]
        fn prop_rejects_non_uuid(s in "[g-z]{1,40}") {
            prop_assert!(s.parse::<UserId>().is_err());
        }
    }
}
