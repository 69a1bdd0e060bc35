//! Data models for the fleet control plane authorization core.
//!
//! The authorization graph is made of [`Tuple`]s: an object [`Entity`] holds a [`Relation`]
//! to a target [`Resource`].
//! Principals ([`GroupEntry`] and [`RoleEntry`]) are referenced in the graph by UUID only,
//! so their names are free to change without affecting any grant.
mod access;
mod identity;
mod principal;
mod relation;
mod resource;
mod tuple;

pub use self::access::AccessLevel;
pub use self::identity::Identity;
pub use self::principal::GroupEntry;
pub use self::principal::Pagination;
pub use self::principal::RoleEntry;
pub use self::relation::Relation;
pub use self::resource::Resource;
pub use self::resource::ResourceKind;
pub use self::tuple::Entity;
pub use self::tuple::TargetFilter;
pub use self::tuple::Tuple;
pub use self::tuple::TupleFilter;
