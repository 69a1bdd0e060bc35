//! Principal store operations to query records.
use anyhow::Result;
use futures::Stream;
use uuid::Uuid;

use fleetcore_models::GroupEntry;
use fleetcore_models::Pagination;
use fleetcore_models::RoleEntry;

use self::seal::SealQueryOp;
use crate::ids::PrincipalKey;

/// Internal trait to enable query operations on the principal store.
pub trait QueryOp: Into<QueryOps> + SealQueryOp {
    /// Type returned by the matching query operation.
    type Response: From<QueryResponses>;
}

/// List of all query operations the principal store must implement.
pub enum QueryOps {
    /// Count all groups.
    CountGroups,

    /// Count all roles.
    CountRoles,

    /// Query a group by name or UUID.
    Group(PrincipalKey),

    /// List groups sorted by name.
    ListGroups(ListPrincipals),

    /// List roles sorted by name.
    ListRoles(ListPrincipals),

    /// Query a role by name or UUID.
    Role(PrincipalKey),
}

/// List of all responses from query operations.
pub enum QueryResponses {
    /// Return the number of matching records.
    Count(u64),

    /// Return a [`GroupEntry`], if one was found matching the query.
    Group(Option<GroupEntry>),

    /// Return a [`Stream`] of [`GroupEntry`] objects.
    GroupEntries(GroupEntryStream),

    /// Return a [`RoleEntry`], if one was found matching the query.
    Role(Option<RoleEntry>),

    /// Return a [`Stream`] of [`RoleEntry`] objects.
    RoleEntries(RoleEntryStream),
}

// --- Operations return types -- //
/// Alias for a heap-allocated [`Stream`] of groups.
pub type GroupEntryStream = std::pin::Pin<Box<dyn Stream<Item = Result<GroupEntry>> + Send>>;

/// Alias for a heap-allocated [`Stream`] of roles.
pub type RoleEntryStream = std::pin::Pin<Box<dyn Stream<Item = Result<RoleEntry>> + Send>>;

// --- High level query operations --- //
/// Count all known groups.
pub struct CountGroups;

/// Count all known roles.
pub struct CountRoles;

/// Filter and window to list principals with.
#[derive(Clone, Debug, Default)]
pub struct ListPrincipals {
    /// Only return principals whose name or UUID contain this string, ignoring case.
    pub filter: Option<String>,

    /// Window over the sorted list of principals.
    pub pagination: Pagination,
}

/// List groups sorted by name in ascending order.
#[derive(Clone, Debug, Default)]
pub struct ListGroups(pub ListPrincipals);

/// List roles sorted by name in ascending order.
#[derive(Clone, Debug, Default)]
pub struct ListRoles(pub ListPrincipals);

/// Lookup a [`GroupEntry`] record by name or UUID.
#[derive(Clone, Debug)]
pub struct LookupGroup(pub PrincipalKey);
impl From<&str> for LookupGroup {
    fn from(value: &str) -> Self {
        LookupGroup(PrincipalKey::from(value))
    }
}
impl From<Uuid> for LookupGroup {
    fn from(value: Uuid) -> Self {
        LookupGroup(PrincipalKey::Uuid(value))
    }
}

/// Lookup a [`RoleEntry`] record by name or UUID.
#[derive(Clone, Debug)]
pub struct LookupRole(pub PrincipalKey);
impl From<&str> for LookupRole {
    fn from(value: &str) -> Self {
        LookupRole(PrincipalKey::from(value))
    }
}
impl From<Uuid> for LookupRole {
    fn from(value: Uuid) -> Self {
        LookupRole(PrincipalKey::Uuid(value))
    }
}

// --- Internal implementation details follow --- //
/// Private module to seal implementation details.
mod seal {
    /// Super-trait to seal the [`QueryOp`](super::QueryOp) trait.
    pub trait SealQueryOp {}
}

// --- Implement QueryOp and super traits on types for transparent operations --- //
impl SealQueryOp for CountGroups {}
impl QueryOp for CountGroups {
    type Response = u64;
}
impl From<CountGroups> for QueryOps {
    fn from(_: CountGroups) -> Self {
        QueryOps::CountGroups
    }
}

impl SealQueryOp for CountRoles {}
impl QueryOp for CountRoles {
    type Response = u64;
}
impl From<CountRoles> for QueryOps {
    fn from(_: CountRoles) -> Self {
        QueryOps::CountRoles
    }
}

impl SealQueryOp for ListGroups {}
impl QueryOp for ListGroups {
    type Response = GroupEntryStream;
}
impl From<ListGroups> for QueryOps {
    fn from(value: ListGroups) -> Self {
        QueryOps::ListGroups(value.0)
    }
}

impl SealQueryOp for ListRoles {}
impl QueryOp for ListRoles {
    type Response = RoleEntryStream;
}
impl From<ListRoles> for QueryOps {
    fn from(value: ListRoles) -> Self {
        QueryOps::ListRoles(value.0)
    }
}

impl SealQueryOp for LookupGroup {}
impl QueryOp for LookupGroup {
    type Response = Option<GroupEntry>;
}
impl From<LookupGroup> for QueryOps {
    fn from(value: LookupGroup) -> Self {
        QueryOps::Group(value.0)
    }
}

impl SealQueryOp for LookupRole {}
impl QueryOp for LookupRole {
    type Response = Option<RoleEntry>;
}
impl From<LookupRole> for QueryOps {
    fn from(value: LookupRole) -> Self {
        QueryOps::Role(value.0)
    }
}

// --- Implement QueryResponses conversions on return types for transparent operations --- //
impl From<QueryResponses> for u64 {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::Count(count) => count,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for Option<GroupEntry> {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::Group(group) => group,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for GroupEntryStream {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::GroupEntries(stream) => stream,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for Option<RoleEntry> {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::Role(role) => role,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for RoleEntryStream {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::RoleEntries(stream) => stream,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
