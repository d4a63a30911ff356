//! # Property Graph Model
//!
//! Graph fragments that can be combined as sets and walked as sequences.
//! `Subgraph` is the unordered view, `Walkable` the ordered one, and
//! `Node` / `Relationship` are both at once.
//!
//! Design rule: NO I/O here. Anything that talks to a database goes
//! through `crate::tx::Transaction` or `crate::storage::RemoteGraph`.

pub mod value;
pub mod property_map;
pub mod identity;
pub mod node;
pub mod relationship;
pub mod entity;
pub mod subgraph;
pub mod walkable;
pub mod path;

pub use value::Value;
pub use property_map::{PropertyDict, PropertyMap};
pub use identity::{Binding, GraphRef, NodeId, RelId, Token};
pub use node::{Node, NodeCast, StaleField};
pub use relationship::{
    RelArg, RelEndpoint, RelTypeSpec, Relationship, RelationshipCast, RelationshipType,
};
pub use entity::Entity;
pub use subgraph::Subgraph;
pub use walkable::{walk, Walk, Walkable};
pub use path::{Path, PathItem};
