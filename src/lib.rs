//! # neo4j-data: In-Memory Property Graph Model
//!
//! Set-algebraic graph fragments (nodes, relationships, paths) with
//! well-defined identity, equality, hashing and traversal, independent of
//! any database connection.
//!
//! ## Design Principles
//!
//! 1. **Handles, not copies**: `Node` and `Relationship` are shared handles;
//!    a `Subgraph` or `Path` stores handles to the same entities
//! 2. **Two equalities**: `Subgraph` compares sets, `Walkable` compares
//!    traversal order
//! 3. **Explicit lifecycle**: an entity is `Unbound(token)` until a remote
//!    graph binds it, after which identity is graph + id
//! 4. **Narrow boundary**: persistence goes through `Transaction`, lazy
//!    refresh goes through `RemoteGraph`
//!
//! ## Quick Start
//!
//! ```rust
//! use neo4j_data::{Node, Path, PathItem};
//!
//! # fn example() -> neo4j_data::Result<()> {
//! let alice = Node::new(["Person"], [("name", "Alice")]);
//! let bob = Node::new(["Person"], [("name", "Bob")]);
//!
//! let path = Path::new([
//!     PathItem::from(alice.clone()),
//!     PathItem::from("KNOWS"),
//!     PathItem::from(bob.clone()),
//! ])?;
//!
//! assert_eq!(path.len(), 1);
//! assert_eq!(path.start_node(), alice);
//! assert_eq!(path.end_node(), bob);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    walk, Binding, Entity, GraphRef, Node, NodeCast, NodeId, Path, PathItem, PropertyDict,
    PropertyMap, RelArg, RelId, Relationship, RelationshipCast, RelationshipType, RelEndpoint,
    RelTypeSpec, StaleField, Subgraph, Token, Value, Walk, Walkable,
};

// ============================================================================
// Re-exports: Storage and Transactions
// ============================================================================

pub use storage::{GraphConfig, MemoryGraph, MemoryTx, RemoteGraph};
pub use tx::{Transaction, TxId, TxMode};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cannot cast {from} to {to}")]
    TypeCoercion { from: String, to: String },

    #[error("Unsupported arity: {0} endpoints given, hyperedges not supported")]
    UnsupportedArity(usize),

    #[error("Cannot append walkable {walkable} to node {node}")]
    DisconnectedWalk { walkable: String, node: String },

    #[error("Object {0} is not walkable")]
    NotWalkable(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Graph unavailable: {0}")]
    GraphUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
