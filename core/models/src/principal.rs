//! Named principals (groups and roles) kept in the relational store.
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::Entity;
use super::Resource;

/// A named group of identities.
///
/// Group membership and grants to the group are only recorded in the authorization graph,
/// keyed by the group UUID.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    /// Numeric identifier assigned by the relational store.
    pub id: i64,

    /// Human facing, unique, name of the group.
    pub name: String,

    /// Immutable identifier of the group in the authorization graph.
    pub uuid: Uuid,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl GroupEntry {
    /// Prepare a new group record with a freshly generated UUID.
    ///
    /// The numeric ID is assigned when the record is persisted.
    pub fn new<S: Into<String>>(name: S) -> GroupEntry {
        let now = OffsetDateTime::now_utc();
        GroupEntry {
            id: 0,
            name: name.into(),
            uuid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the group name or UUID contains the given string, ignoring case.
    pub fn matches(&self, needle: &str) -> bool {
        matches_name_or_uuid(&self.name, &self.uuid, needle)
    }

    /// Userset of all members of the group.
    pub fn members(&self) -> Entity {
        Entity::members(self.uuid)
    }

    /// The group as a target resource in the authorization graph.
    pub fn resource(&self) -> Resource {
        Resource::Group(self.uuid)
    }
}

/// A named role identities can be assigned to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Numeric identifier assigned by the relational store.
    pub id: i64,

    /// Human facing, unique, name of the role.
    pub name: String,

    /// Immutable identifier of the role in the authorization graph.
    pub uuid: Uuid,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl RoleEntry {
    /// Prepare a new role record with a freshly generated UUID.
    pub fn new<S: Into<String>>(name: S) -> RoleEntry {
        let now = OffsetDateTime::now_utc();
        RoleEntry {
            id: 0,
            name: name.into(),
            uuid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Userset of all identities assigned to the role.
    pub fn assignees(&self) -> Entity {
        Entity::assignees(self.uuid)
    }

    /// Check the role name or UUID contains the given string, ignoring case.
    pub fn matches(&self, needle: &str) -> bool {
        matches_name_or_uuid(&self.name, &self.uuid, needle)
    }

    /// The role as a target resource in the authorization graph.
    pub fn resource(&self) -> Resource {
        Resource::Role(self.uuid)
    }
}

/// Window over a sorted list of records.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of records to return, `0` for no limit.
    #[serde(default)]
    pub limit: usize,

    /// Number of records to skip from the start of the list.
    #[serde(default)]
    pub offset: usize,
}

impl Pagination {
    pub fn new(limit: usize, offset: usize) -> Pagination {
        Pagination { limit, offset }
    }
}

fn matches_name_or_uuid(name: &str, uuid: &Uuid, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let needle = needle.to_lowercase();
    name.to_lowercase().contains(&needle) || uuid.to_string().contains(&needle)
}
