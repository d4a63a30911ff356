//! Transaction contract.
//!
//! The model never talks to a database itself. Persistence operations on a
//! `Subgraph` hand the subgraph to a `Transaction`, which owns all I/O and
//! all success/failure semantics.

use serde::{Deserialize, Serialize};

use crate::model::Subgraph;
use crate::Result;

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

/// Executor for subgraph-level persistence operations.
///
/// Each operation receives the subgraph's node and relationship sets.
/// Implementations bind created entities (`Node::bind`,
/// `Relationship::bind`) and refresh pulled ones (`Node::refresh`).
pub trait Transaction: Send {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;

    /// Create every unbound node and relationship.
    fn create(&mut self, subgraph: &Subgraph) -> Result<()>;

    /// Delete every bound node and relationship.
    fn delete(&mut self, subgraph: &Subgraph) -> Result<()>;

    /// Match nodes on `(primary_label, primary_key)`, creating the missing ones.
    fn merge(
        &mut self,
        subgraph: &Subgraph,
        primary_label: Option<&str>,
        primary_key: Option<&str>,
    ) -> Result<()>;

    /// Refresh local state from the remote copy.
    fn pull(&mut self, subgraph: &Subgraph) -> Result<()>;

    /// Write local state to the remote copy.
    fn push(&mut self, subgraph: &Subgraph) -> Result<()>;

    /// Delete the relationships only, leaving nodes in place.
    fn separate(&mut self, subgraph: &Subgraph) -> Result<()>;
}
